//! Input system.
//!
//! 16-key hex keypad:
//!     1 2 3 C
//!     4 5 6 D
//!     7 8 9 E
//!     A 0 B F
//!
//! A key slot holds 1 while the key is held. The `LD Vx, K` wait is
//! expressed by the CPU rewinding its pointer, so the keypad itself is
//! plain state with no locking.

use std::fmt;

use crate::core::types::C8Byte;

/// Key count.
pub const KEY_COUNT: usize = 16;

/// Input state.
#[derive(Clone, Default)]
pub struct Input {
    data: [C8Byte; KEY_COUNT],
}

impl Input {
    /// Create new input state.
    pub fn new() -> Self {
        Default::default()
    }

    /// Press key.
    ///
    /// # Arguments
    ///
    /// * `key` - Key index.
    ///
    pub fn press(&mut self, key: C8Byte) {
        self.data[usize::from(key) & 0xF] = 1;
    }

    /// Release key.
    ///
    /// # Arguments
    ///
    /// * `key` - Key index.
    ///
    pub fn release(&mut self, key: C8Byte) {
        self.data[usize::from(key) & 0xF] = 0;
    }

    /// Release every key.
    pub fn release_all(&mut self) {
        self.data = [0; KEY_COUNT];
    }

    /// Check if key is held.
    ///
    /// # Arguments
    ///
    /// * `key` - Key index.
    ///
    /// # Returns
    ///
    /// * `true` if held.
    /// * `false` if not.
    ///
    pub fn is_pressed(&self, key: C8Byte) -> bool {
        self.data[usize::from(key) & 0xF] == 1
    }

    /// Lowest held key, scanning 0..F in ascending order.
    ///
    /// # Returns
    ///
    /// * Key option.
    ///
    pub fn first_pressed(&self) -> Option<C8Byte> {
        self.data
            .iter()
            .position(|state| *state == 1)
            .map(|idx| idx as C8Byte)
    }

    /// Get key data.
    ///
    /// # Returns
    ///
    /// * Key data.
    ///
    pub fn get_data(&self) -> &[C8Byte] {
        &self.data
    }

    /// Reset.
    pub fn reset(&mut self) {
        self.data = [0; KEY_COUNT];
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, v) in self.data.iter().enumerate() {
            writeln!(f, "    K{:X}: {}", idx, v)?;
        }

        Ok(())
    }
}
