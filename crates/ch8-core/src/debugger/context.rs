//! Debugger context.

use std::error::Error;
use std::fmt;

use rustyline::Editor;

use super::Breakpoints;
use crate::core::types::{convert_hex_addr, C8Addr};
use crate::errors::CResult;

/// Bad breakpoint address.
#[derive(Debug)]
pub struct BadBreakpoint(pub String);

impl Error for BadBreakpoint {}

impl fmt::Display for BadBreakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bad breakpoint address: {}", self.0)
    }
}

/// Debugger context.
pub struct DebuggerContext {
    /// Current listing address.
    pub address: C8Addr,
    /// Execute one instruction on the next turn.
    pub is_stepping: bool,
    /// Run until a breakpoint or a fault.
    pub is_continuing: bool,
    /// A breakpoint was just hit.
    pub breakpoint_hit: bool,
    /// The listing address moved since the last prompt.
    pub has_moved: bool,
    /// Quit requested.
    pub should_quit: bool,
    /// Line editor.
    pub editor: Editor<()>,
    /// Breakpoints.
    pub breakpoints: Breakpoints,
}

impl Default for DebuggerContext {
    fn default() -> Self {
        Self {
            address: 0,
            is_stepping: false,
            is_continuing: false,
            breakpoint_hit: false,
            has_moved: false,
            should_quit: false,
            editor: Editor::<()>::new(),
            breakpoints: Breakpoints::new(),
        }
    }
}

impl DebuggerContext {
    /// Create new context.
    pub fn new() -> Self {
        Default::default()
    }

    /// Set listing address.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address.
    ///
    pub fn set_address(&mut self, addr: C8Addr) {
        self.address = addr;
    }

    /// Pause execution.
    pub fn pause(&mut self) {
        self.is_continuing = false;
        self.is_stepping = false;
    }

    /// Check if paused.
    ///
    /// # Returns
    ///
    /// * `true` if paused.
    /// * `false` if not.
    ///
    pub fn is_paused(&self) -> bool {
        !self.is_continuing
    }

    /// Register breakpoint.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address.
    ///
    pub fn register_breakpoint(&mut self, addr: C8Addr) {
        self.breakpoints.register(addr);
    }

    /// Unregister breakpoint.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address.
    ///
    pub fn unregister_breakpoint(&mut self, addr: C8Addr) {
        self.breakpoints.unregister(addr);
    }

    /// Register breakpoint from an hex address string.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address string.
    ///
    /// # Returns
    ///
    /// * Empty result.
    ///
    pub fn register_breakpoint_str(&mut self, addr: &str) -> CResult {
        match convert_hex_addr(addr) {
            Some(addr) => {
                self.breakpoints.register(addr);
                Ok(())
            }
            None => Err(Box::new(BadBreakpoint(addr.to_string()))),
        }
    }
}
