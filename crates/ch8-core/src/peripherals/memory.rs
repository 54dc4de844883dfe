//! CPU memory.
//!
//! Flat 4 KiB address space. The font glyphs occupy [0x050, 0x0A0) and
//! survive every reset; programs load at 0x200. The program counter
//! lives here as the memory pointer.

use std::fmt;

use crate::core::{
    font::{FONT_DATA, FONT_DATA_ADDR},
    opcodes::opcode_at,
    types::{C8Addr, C8Byte},
};

/// Memory size.
pub const MEMORY_SIZE: usize = 4096;
/// Initial memory pointer.
pub const INITIAL_MEMORY_POINTER: C8Addr = 0x200;

const CHUNK_SIZE: usize = 32;

/// CPU memory struct.
#[derive(Clone)]
pub struct Memory {
    data: [C8Byte; MEMORY_SIZE],
    pointer: C8Addr,
    code_end_pointer: C8Addr,
}

impl Default for Memory {
    fn default() -> Self {
        let mut memory = Memory {
            data: [0; MEMORY_SIZE],
            pointer: INITIAL_MEMORY_POINTER,
            code_end_pointer: INITIAL_MEMORY_POINTER,
        };
        memory.load_font();
        memory
    }
}

impl Memory {
    /// Create new memory with the font set loaded.
    pub fn new() -> Self {
        Default::default()
    }

    fn load_font(&mut self) {
        self.write_data_at_offset(FONT_DATA_ADDR, &FONT_DATA);
    }

    /// Write data at offset.
    ///
    /// # Arguments
    ///
    /// * `offset` - Offset.
    /// * `data` - Data (bytes).
    ///
    pub fn write_data_at_offset(&mut self, offset: C8Addr, data: &[C8Byte]) {
        for (idx, v) in data.iter().enumerate() {
            self.data[offset as usize + idx] = *v;
        }

        let end_ptr = offset + data.len() as C8Addr;
        if end_ptr > self.code_end_pointer {
            self.code_end_pointer = end_ptr;
        }
    }

    /// Write byte at offset.
    ///
    /// # Arguments
    ///
    /// * `offset` - Offset.
    /// * `byte` - Byte.
    ///
    pub fn write_byte_at_offset(&mut self, offset: C8Addr, byte: C8Byte) {
        self.data[offset as usize] = byte;
    }

    /// Write data at the current pointer.
    ///
    /// # Arguments
    ///
    /// * `data` - Data (bytes).
    ///
    pub fn write_data_at_pointer(&mut self, data: &[C8Byte]) {
        let pointer = self.pointer;
        self.write_data_at_offset(pointer, data)
    }

    /// Get data at offset.
    ///
    /// # Arguments
    ///
    /// * `offset` - Offset.
    /// * `count` - Count.
    ///
    /// # Returns
    ///
    /// * Data slice.
    ///
    pub fn read_data_at_offset(&self, offset: C8Addr, count: C8Addr) -> &[C8Byte] {
        &self.data[(offset as usize)..((offset + count) as usize)]
    }

    /// Get byte at offset.
    ///
    /// # Arguments
    ///
    /// * `offset` - Offset.
    ///
    /// # Returns
    ///
    /// * Byte.
    ///
    pub fn read_byte_at_offset(&self, offset: C8Addr) -> C8Byte {
        self.data[offset as usize]
    }

    /// Set pointer.
    ///
    /// # Arguments
    ///
    /// * `pointer` - Pointer.
    ///
    pub fn set_pointer(&mut self, pointer: C8Addr) {
        self.pointer = pointer;
    }

    /// Get pointer.
    ///
    /// # Returns
    ///
    /// * Pointer value.
    ///
    pub fn get_pointer(&self) -> C8Addr {
        self.pointer
    }

    /// Advance pointer by one instruction.
    pub fn advance_pointer(&mut self) {
        self.pointer = self.pointer.wrapping_add(2);
    }

    /// Rewind pointer by one instruction.
    pub fn rewind_pointer(&mut self) {
        self.pointer = self.pointer.wrapping_sub(2);
    }

    /// Read opcode at the current pointer.
    ///
    /// # Returns
    ///
    /// * Opcode value.
    ///
    pub fn read_opcode(&self) -> C8Addr {
        self.read_opcode_at_address(self.pointer)
    }

    /// Read opcode at address.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address.
    ///
    /// # Returns
    ///
    /// * Opcode value.
    ///
    pub fn read_opcode_at_address(&self, addr: C8Addr) -> C8Addr {
        opcode_at(&self.data, addr as usize)
    }

    /// Get end pointer of the loaded code.
    ///
    /// # Returns
    ///
    /// * End pointer.
    ///
    pub fn get_end_pointer(&self) -> C8Addr {
        self.code_end_pointer
    }

    /// Get data.
    ///
    /// # Returns
    ///
    /// * Data.
    ///
    pub fn get_data(&self) -> &[C8Byte] {
        &self.data
    }

    /// Reset memory.
    ///
    /// Zero everything, reload the font region, restore the pointer.
    pub fn reset(&mut self) {
        self.data = [0; MEMORY_SIZE];
        self.pointer = INITIAL_MEMORY_POINTER;
        self.code_end_pointer = INITIAL_MEMORY_POINTER;
        self.load_font();
    }
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, chunk) in self.data.chunks(CHUNK_SIZE).enumerate() {
            write!(f, "    {:04X} | ", idx * CHUNK_SIZE)?;
            for chunk_value in chunk.iter() {
                write!(f, "{:02X} ", chunk_value)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "    PC: {:04X}", self.pointer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_loaded_and_preserved() {
        let mut memory = Memory::new();
        assert_eq!(memory.read_byte_at_offset(0x050), 0xF0);
        assert_eq!(memory.read_byte_at_offset(0x09F), 0x80);

        memory.write_data_at_pointer(&[0x12, 0x34]);
        memory.reset();

        assert_eq!(memory.read_byte_at_offset(0x050), 0xF0);
        assert_eq!(memory.read_byte_at_offset(0x200), 0x00);
        assert_eq!(memory.get_pointer(), INITIAL_MEMORY_POINTER);
    }

    #[test]
    fn test_pointer_moves() {
        let mut memory = Memory::new();
        memory.advance_pointer();
        assert_eq!(memory.get_pointer(), 0x202);
        memory.rewind_pointer();
        assert_eq!(memory.get_pointer(), 0x200);
    }

    #[test]
    fn test_read_opcode() {
        let mut memory = Memory::new();
        memory.write_data_at_pointer(&[0x60, 0xFF]);
        assert_eq!(memory.read_opcode(), 0x60FF);
        assert_eq!(memory.get_end_pointer(), 0x202);
    }
}
