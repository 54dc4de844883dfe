//! Peripherals.

pub mod cartridge;
pub mod input;
pub mod memory;
pub mod screen;

use input::Input;
use memory::Memory;
use screen::Screen;

/// Peripherals aggregate: memory, screen, keypad.
#[derive(Clone, Default)]
pub struct Peripherals {
    /// Memory.
    pub memory: Memory,
    /// Screen.
    pub screen: Screen,
    /// Input.
    pub input: Input,
}

impl Peripherals {
    /// Create new peripherals.
    pub fn new() -> Self {
        Default::default()
    }

    /// Reset peripherals.
    pub fn reset(&mut self) {
        self.memory.reset();
        self.screen.reset();
        self.input.reset();
    }
}
