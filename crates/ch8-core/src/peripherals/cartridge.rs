//! CHIP-8 cartridge.
//!
//! Raw byte stream, no header, loaded verbatim at 0x200.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::types::C8Byte;
use crate::disassembler;
use crate::errors::{CResult, VmError};

/// Cartridge max size.
pub const CARTRIDGE_MAX_SIZE: usize = 4096 - 512;

const EMPTY_GAME_NAME: &str = "<EMPTY>";

/// CHIP-8 cartridge type.
#[derive(Clone, Default)]
pub struct Cartridge {
    title: String,
    data: Vec<C8Byte>,
}

impl Cartridge {
    /// New empty cartridge.
    pub fn new_empty() -> Self {
        Self {
            title: String::from(EMPTY_GAME_NAME),
            data: vec![],
        }
    }

    /// Set cartridge data.
    ///
    /// # Arguments
    ///
    /// * `data` - Data (bytes).
    ///
    pub fn set_data(&mut self, data: Vec<C8Byte>) {
        self.data = data;
    }

    /// Load cartridge from path.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to file.
    ///
    /// # Returns
    ///
    /// * Cartridge result.
    ///
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> CResult<Cartridge> {
        debug!("loading cartridge from {:?}", path.as_ref());

        let mut file = File::open(path.as_ref())?;
        let mut contents = Vec::with_capacity(CARTRIDGE_MAX_SIZE);
        file.read_to_end(&mut contents)?;

        if contents.len() > CARTRIDGE_MAX_SIZE {
            return Err(Box::new(VmError::RomTooLarge {
                size: contents.len(),
            }));
        }

        Ok(Cartridge {
            title: Self::game_name(path.as_ref()),
            data: contents,
        })
    }

    /// Save cartridge to path.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to file.
    ///
    /// # Returns
    ///
    /// * Empty result.
    ///
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> CResult {
        debug!("saving {} bytes to {:?}", self.data.len(), path.as_ref());

        let mut file = File::create(path.as_ref())?;
        file.write_all(&self.data)?;
        Ok(())
    }

    /// Get game name from path.
    fn game_name(path: &Path) -> String {
        match path.file_stem() {
            Some(stem) => stem.to_string_lossy().to_uppercase().replace('_', " "),
            None => String::from(EMPTY_GAME_NAME),
        }
    }

    /// Get cartridge title.
    pub fn get_title(&self) -> &str {
        &self.title
    }

    /// Get internal data.
    pub fn get_data(&self) -> &[C8Byte] {
        &self.data
    }

    /// Disassemble cartridge into listing lines.
    ///
    /// # Arguments
    ///
    /// * `verbose` - Prefix lines with address and raw opcode.
    ///
    /// # Returns
    ///
    /// * Listing lines, one per instruction.
    ///
    pub fn disassemble(&self, verbose: bool) -> Vec<String> {
        disassembler::disassemble_rom_lines(&self.data, verbose)
    }

    /// Write disassembly to stream.
    ///
    /// # Arguments
    ///
    /// * `output` - Output stream.
    /// * `verbose` - Prefix lines with address and raw opcode.
    ///
    /// # Returns
    ///
    /// * Empty result.
    ///
    pub fn write_disassembly_to_stream<W: Write>(&self, output: &mut W, verbose: bool) -> CResult {
        for line in self.disassemble(verbose) {
            writeln!(output, "{}", line)?;
        }

        Ok(())
    }

    /// Write disassembly to a file, or stdout when no path is given.
    ///
    /// # Arguments
    ///
    /// * `output_file` - Output path option.
    /// * `verbose` - Prefix lines with address and raw opcode.
    ///
    /// # Returns
    ///
    /// * Empty result.
    ///
    pub fn write_disassembly_to_file(&self, output_file: Option<PathBuf>, verbose: bool) -> CResult {
        match output_file {
            Some(path) => {
                let mut file = File::create(path)?;
                self.write_disassembly_to_stream(&mut file, verbose)
            }
            None => self.write_disassembly_to_stream(&mut io::stdout(), verbose),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disassemble_data() {
        let mut cartridge = Cartridge::new_empty();
        cartridge.set_data(vec![0x00, 0xE0, 0x63, 0x00]);

        assert_eq!(cartridge.disassemble(false), vec!["CLS", "LD V3, 0x00"]);

        let mut raw = Vec::new();
        cartridge.write_disassembly_to_stream(&mut raw, true).unwrap();
        let text = std::str::from_utf8(&raw).unwrap();
        assert_eq!(text, "0200: 00e0  CLS\n0202: 6300  LD V3, 0x00\n");
    }

    #[test]
    fn test_game_name() {
        assert_eq!(Cartridge::game_name(Path::new("TOTO.ch8")), "TOTO");
        assert_eq!(Cartridge::game_name(Path::new("dir/my_game.ch8")), "MY GAME");
        assert_eq!(Cartridge::game_name(Path::new("")), EMPTY_GAME_NAME);
    }

    #[test]
    fn test_file_round_trip() {
        use tempdir::TempDir;

        let mut cartridge = Cartridge::new_empty();
        cartridge.set_data(vec![0x60, 0x22, 0xFF, 0xFF]);

        let tmpdir = TempDir::new("cartridge-test").unwrap();
        let path = tmpdir.path().join("example.ch8");
        cartridge.save_to_path(&path).unwrap();

        let reloaded = Cartridge::load_from_path(&path).unwrap();
        assert_eq!(reloaded.get_data(), cartridge.get_data());
        assert_eq!(reloaded.get_title(), "EXAMPLE");
    }
}
