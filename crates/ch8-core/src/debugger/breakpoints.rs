//! Breakpoints.

use std::fmt;

use tracing::info;

use crate::core::types::C8Addr;

/// Breakpoint address set.
#[derive(Default)]
pub struct Breakpoints(Vec<C8Addr>);

impl Breakpoints {
    /// Create breakpoints.
    pub fn new() -> Self {
        Default::default()
    }

    /// Register breakpoint.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address.
    ///
    pub fn register(&mut self, addr: C8Addr) {
        if self.position(addr).is_none() {
            info!("registering breakpoint at address 0x{:04X}", addr);
            self.0.push(addr);
        }
    }

    /// Unregister breakpoint.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address.
    ///
    pub fn unregister(&mut self, addr: C8Addr) {
        if let Some(idx) = self.position(addr) {
            info!("unregistering breakpoint at address 0x{:04X}", addr);
            self.0.remove(idx);
        }
    }

    /// Check breakpoint at address.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address.
    ///
    /// # Returns
    ///
    /// * `true` if a breakpoint exists.
    /// * `false` if not.
    ///
    pub fn check_breakpoint(&self, addr: C8Addr) -> bool {
        self.position(addr).is_some()
    }

    fn position(&self, addr: C8Addr) -> Option<usize> {
        self.0.iter().position(|&x| x == addr)
    }
}

impl fmt::Debug for Breakpoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "breakpoints:")?;
        if self.0.is_empty() {
            writeln!(f, "  none")?;
        } else {
            for addr in &self.0 {
                writeln!(f, "  - 0x{:04X}", addr)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakpoints() {
        let mut bps = Breakpoints::new();
        assert!(!bps.check_breakpoint(0x1234));

        bps.register(0x1234);
        bps.register(0x1234);
        assert!(bps.check_breakpoint(0x1234));

        bps.unregister(0x1234);
        assert!(!bps.check_breakpoint(0x1234));
        bps.unregister(0x1234);
    }
}
