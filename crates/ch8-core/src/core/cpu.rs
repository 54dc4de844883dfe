//! CPU.
//!
//! Fetch/decode/execute over the opcode enum. One `cycle` performs a
//! full instruction: fetch at the memory pointer, advance by 2, then
//! apply every side effect of the decoded opcode.

use std::fmt;

use tracing::debug;

use super::{
    font::glyph_addr,
    opcodes::OpCode,
    random::{QuadRandSource, RandomSource},
    registers::Registers,
    stack::Stack,
    timer::Timer,
    types::{C8Addr, C8Byte},
};
use crate::{
    errors::VmError,
    peripherals::{
        cartridge::Cartridge,
        memory::{INITIAL_MEMORY_POINTER, MEMORY_SIZE},
        Peripherals,
    },
};

/// Observable machine state after a cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CpuState {
    /// Executing normally.
    Running,
    /// A key wait rewound the pointer; the same instruction re-fetches
    /// next cycle.
    WaitingForKey,
    /// The halt instruction was reached; sticky until reset or load.
    Halted,
}

/// Compatibility switches.
///
/// Both default to off, which matches the CHIP-48 conventions this
/// machine follows: shifts act in place, `ADD I, Vx` leaves VF alone
/// and `LD [I], Vx` / `LD Vx, [I]` leave I alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct Quirks {
    /// `ADD I, Vx` sets VF on 12-bit overflow.
    pub add_i_sets_vf: bool,
    /// `LD [I], Vx` / `LD Vx, [I]` increment I by x + 1 afterwards.
    pub transfer_increments_i: bool,
}

/// CHIP-8 CPU.
pub struct Cpu {
    /// Peripherals.
    pub peripherals: Peripherals,
    /// Registers.
    pub registers: Registers,
    /// Stack.
    pub stack: Stack,
    /// Delay timer.
    pub delay_timer: Timer,
    /// Sound timer.
    pub sound_timer: Timer,
    /// Compatibility switches.
    pub quirks: Quirks,

    opcode: C8Addr,
    halted: bool,
    rom: Vec<C8Byte>,
    random: Box<dyn RandomSource>,
}

impl Cpu {
    /// Create CHIP-8 CPU with default parameters.
    pub fn new() -> Self {
        Self::with_random_source(Box::new(QuadRandSource::new()))
    }

    /// Create CHIP-8 CPU with a custom random source.
    ///
    /// # Arguments
    ///
    /// * `random` - Random byte source.
    ///
    pub fn with_random_source(random: Box<dyn RandomSource>) -> Self {
        Cpu {
            peripherals: Peripherals::new(),
            registers: Registers::new(),
            stack: Stack::new(),
            delay_timer: Timer::new(),
            sound_timer: Timer::new(),
            quirks: Quirks::default(),
            opcode: 0,
            halted: false,
            rom: vec![],
            random,
        }
    }

    /// Load a ROM.
    ///
    /// Resets the machine, then copies the bytes at 0x200 and records
    /// them for disassembly.
    ///
    /// # Arguments
    ///
    /// * `bytes` - ROM bytes.
    ///
    /// # Returns
    ///
    /// * Empty result, or `RomTooLarge`.
    ///
    pub fn load(&mut self, bytes: &[C8Byte]) -> Result<(), VmError> {
        if INITIAL_MEMORY_POINTER as usize + bytes.len() > MEMORY_SIZE {
            return Err(VmError::RomTooLarge { size: bytes.len() });
        }

        debug!("loading {} bytes at 0x{:04X}", bytes.len(), INITIAL_MEMORY_POINTER);

        self.reset();
        self.peripherals.memory.write_data_at_pointer(bytes);
        self.rom = bytes.to_vec();
        Ok(())
    }

    /// Load a cartridge.
    ///
    /// # Arguments
    ///
    /// * `cartridge` - Cartridge.
    ///
    /// # Returns
    ///
    /// * Empty result, or `RomTooLarge`.
    ///
    pub fn load_cartridge(&mut self, cartridge: &Cartridge) -> Result<(), VmError> {
        self.load(cartridge.get_data())
    }

    /// Reset the machine.
    ///
    /// Zeroes everything except the font region of memory, restores
    /// the pointer to 0x200 and clears the halt flag. The recorded ROM
    /// copy is kept.
    pub fn reset(&mut self) {
        self.peripherals.reset();
        self.registers.reset();
        self.stack.reset();
        self.delay_timer.reset(0);
        self.sound_timer.reset(0);
        self.opcode = 0;
        self.halted = false;
    }

    /// Decrement both timers.
    ///
    /// Called by the host at 60 Hz, independently of the cycle rate.
    pub fn update_timers(&mut self) {
        self.delay_timer.decrement();
        self.sound_timer.decrement();
    }

    /// Perform one fetch/decode/execute step.
    ///
    /// # Returns
    ///
    /// * Machine state after the step, or a fatal error.
    ///
    pub fn cycle(&mut self) -> Result<CpuState, VmError> {
        if self.halted {
            return Ok(CpuState::Halted);
        }

        self.opcode = self.peripherals.memory.read_opcode();
        self.peripherals.memory.advance_pointer();

        let opcode = OpCode::decode(self.opcode);
        self.execute(opcode)
    }

    /// Check halt flag.
    ///
    /// # Returns
    ///
    /// * `true` if halted.
    /// * `false` if not.
    ///
    pub fn halted(&self) -> bool {
        self.halted
    }

    /// Check the sound gate.
    ///
    /// # Returns
    ///
    /// * `true` while the sound timer is non-zero.
    /// * `false` if not.
    ///
    pub fn sound_active(&self) -> bool {
        self.sound_timer.active()
    }

    /// Get the currently executing opcode word.
    ///
    /// # Returns
    ///
    /// * Opcode value.
    ///
    pub fn current_opcode(&self) -> C8Addr {
        self.opcode
    }

    /// Get the recorded ROM copy.
    ///
    /// # Returns
    ///
    /// * ROM bytes.
    ///
    pub fn rom(&self) -> &[C8Byte] {
        &self.rom
    }

    fn check_transfer(&self, addr: C8Addr, count: usize) -> Result<(), VmError> {
        if addr as usize + count > MEMORY_SIZE {
            Err(VmError::MemoryOutOfBounds { addr })
        } else {
            Ok(())
        }
    }

    fn execute(&mut self, opcode: OpCode) -> Result<CpuState, VmError> {
        match opcode {
            OpCode::Cls => {
                self.peripherals.screen.clear_screen();
            }
            OpCode::Ret => {
                let addr = self.stack.pop()?;
                self.peripherals.memory.set_pointer(addr);
            }
            OpCode::Jp(addr) => {
                self.peripherals.memory.set_pointer(addr);
            }
            OpCode::Call(addr) => {
                self.stack.push(self.peripherals.memory.get_pointer())?;
                self.peripherals.memory.set_pointer(addr);
            }
            OpCode::SeByte(reg, byte) => {
                if self.registers.get_register(reg) == byte {
                    self.peripherals.memory.advance_pointer();
                }
            }
            OpCode::SneByte(reg, byte) => {
                if self.registers.get_register(reg) != byte {
                    self.peripherals.memory.advance_pointer();
                }
            }
            OpCode::SeReg(reg1, reg2) => {
                if self.registers.get_register(reg1) == self.registers.get_register(reg2) {
                    self.peripherals.memory.advance_pointer();
                }
            }
            OpCode::LdByte(reg, byte) => {
                self.registers.set_register(reg, byte);
            }
            OpCode::AddByte(reg, byte) => {
                // VF untouched.
                let r = self.registers.get_register(reg);
                self.registers.set_register(reg, r.wrapping_add(byte));
            }
            OpCode::LdReg(reg1, reg2) => {
                let r2 = self.registers.get_register(reg2);
                self.registers.set_register(reg1, r2);
            }
            OpCode::Or(reg1, reg2) => {
                let (r1, r2) = self.register_pair(reg1, reg2);
                self.registers.set_register(reg1, r1 | r2);
            }
            OpCode::And(reg1, reg2) => {
                let (r1, r2) = self.register_pair(reg1, reg2);
                self.registers.set_register(reg1, r1 & r2);
            }
            OpCode::Xor(reg1, reg2) => {
                let (r1, r2) = self.register_pair(reg1, reg2);
                self.registers.set_register(reg1, r1 ^ r2);
            }
            OpCode::AddReg(reg1, reg2) => {
                let (r1, r2) = self.register_pair(reg1, reg2);
                let (res, overflow) = r1.overflowing_add(r2);
                self.registers.set_flag(overflow as C8Byte);
                self.registers.set_register(reg1, res);
            }
            OpCode::Sub(reg1, reg2) => {
                let (r1, r2) = self.register_pair(reg1, reg2);
                self.registers.set_flag((r1 > r2) as C8Byte);
                self.registers.set_register(reg1, r1.wrapping_sub(r2));
            }
            OpCode::Shr(reg) => {
                let r = self.registers.get_register(reg);
                self.registers.set_flag(r & 1);
                self.registers.set_register(reg, r >> 1);
            }
            OpCode::Subn(reg1, reg2) => {
                let (r1, r2) = self.register_pair(reg1, reg2);
                self.registers.set_flag((r2 > r1) as C8Byte);
                self.registers.set_register(reg1, r2.wrapping_sub(r1));
            }
            OpCode::Shl(reg) => {
                let r = self.registers.get_register(reg);
                self.registers.set_flag((r >> 7) & 1);
                self.registers.set_register(reg, r << 1);
            }
            OpCode::SneReg(reg1, reg2) => {
                if self.registers.get_register(reg1) != self.registers.get_register(reg2) {
                    self.peripherals.memory.advance_pointer();
                }
            }
            OpCode::LdI(addr) => {
                self.registers.set_i_register(addr);
            }
            OpCode::JpV0(addr) => {
                let v0 = C8Addr::from(self.registers.get_register(0));
                self.peripherals.memory.set_pointer(addr + v0);
            }
            OpCode::Rnd(reg, byte) => {
                let value = self.random.random_byte() & byte;
                self.registers.set_register(reg, value);
            }
            OpCode::Drw(reg1, reg2, rows) => {
                let i = self.registers.get_i_register();
                self.check_transfer(i, usize::from(rows))?;

                let r1 = self.registers.get_register(reg1);
                let r2 = self.registers.get_register(reg2);
                let sprite = self
                    .peripherals
                    .memory
                    .read_data_at_offset(i, C8Addr::from(rows));

                let collision = self.peripherals.screen.draw_sprite(r1, r2, sprite);
                self.registers.set_flag(collision as C8Byte);
            }
            OpCode::Skp(reg) => {
                let r = self.registers.get_register(reg);
                if self.peripherals.input.is_pressed(r) {
                    self.peripherals.memory.advance_pointer();
                }
            }
            OpCode::Sknp(reg) => {
                let r = self.registers.get_register(reg);
                if !self.peripherals.input.is_pressed(r) {
                    self.peripherals.memory.advance_pointer();
                }
            }
            OpCode::LdFromDelay(reg) => {
                let dt = self.delay_timer.get_value();
                self.registers.set_register(reg, dt);
            }
            OpCode::LdKey(reg) => match self.peripherals.input.first_pressed() {
                Some(key) => {
                    self.registers.set_register(reg, key);
                }
                None => {
                    // Re-execute the same instruction next cycle.
                    self.peripherals.memory.rewind_pointer();
                    return Ok(CpuState::WaitingForKey);
                }
            },
            OpCode::LdToDelay(reg) => {
                let r = self.registers.get_register(reg);
                self.delay_timer.reset(r);
            }
            OpCode::LdToSound(reg) => {
                let r = self.registers.get_register(reg);
                self.sound_timer.reset(r);
            }
            OpCode::AddI(reg) => {
                let i = self.registers.get_i_register();
                let r = C8Addr::from(self.registers.get_register(reg));
                let sum = i + r;

                if self.quirks.add_i_sets_vf {
                    self.registers.set_flag((sum > 0x0FFF) as C8Byte);
                }

                self.registers.set_i_register(sum & 0x0FFF);
            }
            OpCode::LdFont(reg) => {
                let digit = self.registers.get_register(reg);
                self.registers.set_i_register(glyph_addr(digit));
            }
            OpCode::LdBcd(reg) => {
                let i = self.registers.get_i_register();
                self.check_transfer(i, 3)?;

                let r = self.registers.get_register(reg);
                self.peripherals
                    .memory
                    .write_data_at_offset(i, &[r / 100, (r % 100) / 10, r % 10]);
            }
            OpCode::Store(reg) => {
                let i = self.registers.get_i_register();
                self.check_transfer(i, usize::from(reg) + 1)?;

                for ridx in 0..=reg {
                    let r = self.registers.get_register(ridx);
                    self.peripherals
                        .memory
                        .write_byte_at_offset(i + C8Addr::from(ridx), r);
                }

                if self.quirks.transfer_increments_i {
                    self.registers.set_i_register(i + C8Addr::from(reg) + 1);
                }
            }
            OpCode::Load(reg) => {
                let i = self.registers.get_i_register();
                self.check_transfer(i, usize::from(reg) + 1)?;

                for ridx in 0..=reg {
                    let byte = self
                        .peripherals
                        .memory
                        .read_byte_at_offset(i + C8Addr::from(ridx));
                    self.registers.set_register(ridx, byte);
                }

                if self.quirks.transfer_increments_i {
                    self.registers.set_i_register(i + C8Addr::from(reg) + 1);
                }
            }
            OpCode::Halt => {
                self.halted = true;
                return Ok(CpuState::Halted);
            }
            OpCode::Sys(_) | OpCode::Data(_) => {
                return Err(VmError::UnknownOpcode {
                    pc: self.peripherals.memory.get_pointer(),
                    opcode: self.opcode,
                });
            }
        }

        Ok(CpuState::Running)
    }

    fn register_pair(&self, reg1: C8Byte, reg2: C8Byte) -> (C8Byte, C8Byte) {
        (
            self.registers.get_register(reg1),
            self.registers.get_register(reg2),
        )
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CPU {{")?;

        writeln!(f, "  registers: {{")?;
        write!(f, "{:?}", self.registers)?;
        writeln!(f, "  }},")?;

        writeln!(f, "  stack: {{")?;
        write!(f, "{:?}", self.stack)?;
        writeln!(f, "  }},")?;

        writeln!(f, "  input: {{")?;
        write!(f, "{:?}", self.peripherals.input)?;
        writeln!(f, "  }},")?;

        writeln!(f, "  screen: {{")?;
        write!(f, "{:?}", self.peripherals.screen)?;
        writeln!(f, "  }},")?;

        writeln!(f, "  PC: {:04X},", self.peripherals.memory.get_pointer())?;
        writeln!(f, "  opcode: {:04X},", self.opcode)?;
        writeln!(f, "  delay_timer: {:?},", self.delay_timer)?;
        writeln!(f, "  sound_timer: {:?},", self.sound_timer)?;
        writeln!(f, "  halted: {},", self.halted)?;

        writeln!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::random::SequenceSource;

    fn cpu_with(rom: &[C8Byte]) -> Cpu {
        let mut cpu = Cpu::new();
        cpu.load(rom).unwrap();
        cpu
    }

    #[test]
    fn test_load_resets_state() {
        let mut cpu = cpu_with(&[0x60, 0xFF]);
        cpu.cycle().unwrap();
        assert_eq!(cpu.registers.get_register(0), 0xFF);

        cpu.load(&[0x61, 0x01]).unwrap();
        assert_eq!(cpu.registers.get_register(0), 0);
        assert_eq!(cpu.peripherals.memory.get_pointer(), 0x200);
        assert_eq!(cpu.stack.get_pointer(), 0);
        assert!(cpu.peripherals.screen.is_blank());
        assert_eq!(cpu.rom(), &[0x61, 0x01]);
    }

    #[test]
    fn test_load_too_large() {
        let mut cpu = Cpu::new();
        let rom = vec![0u8; 3585];
        assert_eq!(cpu.load(&rom), Err(VmError::RomTooLarge { size: 3585 }));
        assert!(cpu.load(&vec![0u8; 3584]).is_ok());
    }

    #[test]
    fn test_fetch_advances_pointer() {
        let mut cpu = cpu_with(&[0x60, 0xFF]);
        assert_eq!(cpu.cycle().unwrap(), CpuState::Running);
        assert_eq!(cpu.registers.get_register(0), 0xFF);
        assert_eq!(cpu.peripherals.memory.get_pointer(), 0x202);
        assert_eq!(cpu.current_opcode(), 0x60FF);
    }

    #[test]
    fn test_add_byte_wraps_without_flag() {
        // LD V0, 0xFF; ADD V0, 0x02
        let mut cpu = cpu_with(&[0x60, 0xFF, 0x70, 0x02]);
        cpu.cycle().unwrap();
        cpu.cycle().unwrap();
        assert_eq!(cpu.registers.get_register(0), 0x01);
        assert_eq!(cpu.registers.get_register(0xF), 0);
    }

    #[test]
    fn test_add_reg_carry() {
        // LD V0, 0xFF; LD V1, 0x01; ADD V0, V1
        let mut cpu = cpu_with(&[0x60, 0xFF, 0x61, 0x01, 0x80, 0x14]);
        for _ in 0..3 {
            cpu.cycle().unwrap();
        }
        assert_eq!(cpu.registers.get_register(0), 0x00);
        assert_eq!(cpu.registers.get_register(0xF), 1);
    }

    #[test]
    fn test_sub_borrow() {
        // LD V0, 0x00; LD V1, 0x01; SUB V0, V1
        let mut cpu = cpu_with(&[0x60, 0x00, 0x61, 0x01, 0x80, 0x15]);
        for _ in 0..3 {
            cpu.cycle().unwrap();
        }
        assert_eq!(cpu.registers.get_register(0), 0xFF);
        assert_eq!(cpu.registers.get_register(0xF), 0);
    }

    #[test]
    fn test_subn() {
        // LD V0, 0x01; LD V1, 0x03; SUBN V0, V1
        let mut cpu = cpu_with(&[0x60, 0x01, 0x61, 0x03, 0x80, 0x17]);
        for _ in 0..3 {
            cpu.cycle().unwrap();
        }
        assert_eq!(cpu.registers.get_register(0), 0x02);
        assert_eq!(cpu.registers.get_register(0xF), 1);
    }

    #[test]
    fn test_shifts() {
        // LD V0, 0x03; SHR V0
        let mut cpu = cpu_with(&[0x60, 0x03, 0x80, 0x06]);
        cpu.cycle().unwrap();
        cpu.cycle().unwrap();
        assert_eq!(cpu.registers.get_register(0), 0x01);
        assert_eq!(cpu.registers.get_register(0xF), 1);

        // LD V0, 0x81; SHL V0
        let mut cpu = cpu_with(&[0x60, 0x81, 0x80, 0x0E]);
        cpu.cycle().unwrap();
        cpu.cycle().unwrap();
        assert_eq!(cpu.registers.get_register(0), 0x02);
        assert_eq!(cpu.registers.get_register(0xF), 1);
    }

    #[test]
    fn test_skips() {
        // SE V0, 0x00 skips the next instruction.
        let mut cpu = cpu_with(&[0x30, 0x00, 0x60, 0xAA, 0x60, 0xBB]);
        cpu.cycle().unwrap();
        assert_eq!(cpu.peripherals.memory.get_pointer(), 0x204);
        cpu.cycle().unwrap();
        assert_eq!(cpu.registers.get_register(0), 0xBB);
    }

    #[test]
    fn test_jp_and_jp_v0() {
        let mut cpu = cpu_with(&[0x12, 0x06]);
        cpu.cycle().unwrap();
        assert_eq!(cpu.peripherals.memory.get_pointer(), 0x206);

        // LD V0, 0x04; JP V0, 0x204
        let mut cpu = cpu_with(&[0x60, 0x04, 0xB2, 0x04]);
        cpu.cycle().unwrap();
        cpu.cycle().unwrap();
        assert_eq!(cpu.peripherals.memory.get_pointer(), 0x208);
    }

    #[test]
    fn test_rnd_uses_injected_source() {
        let source = SequenceSource::new(vec![0xAB]);
        let mut cpu = Cpu::with_random_source(Box::new(source));
        // RND V0, 0x0F
        cpu.load(&[0xC0, 0x0F]).unwrap();
        cpu.cycle().unwrap();
        assert_eq!(cpu.registers.get_register(0), 0x0B);
    }

    #[test]
    fn test_bcd() {
        // LD V0, 123; LD I, 0x300; LD B, V0
        let mut cpu = cpu_with(&[0x60, 0x7B, 0xA3, 0x00, 0xF0, 0x33]);
        for _ in 0..3 {
            cpu.cycle().unwrap();
        }
        assert_eq!(
            cpu.peripherals.memory.read_data_at_offset(0x300, 3),
            &[1, 2, 3]
        );
    }

    #[test]
    fn test_store_load_keep_i() {
        // LD V0, 0x11; LD V1, 0x22; LD I, 0x300; LD [I], V1
        let mut cpu = cpu_with(&[0x60, 0x11, 0x61, 0x22, 0xA3, 0x00, 0xF1, 0x55]);
        for _ in 0..4 {
            cpu.cycle().unwrap();
        }
        assert_eq!(
            cpu.peripherals.memory.read_data_at_offset(0x300, 2),
            &[0x11, 0x22]
        );
        assert_eq!(cpu.registers.get_i_register(), 0x300);

        // LD I, 0x300; LD V1, [I]
        let mut cpu2 = cpu_with(&[0xA3, 0x00, 0xF1, 0x65]);
        cpu2.peripherals
            .memory
            .write_data_at_offset(0x300, &[0x33, 0x44]);
        cpu2.cycle().unwrap();
        cpu2.cycle().unwrap();
        assert_eq!(cpu2.registers.get_register(0), 0x33);
        assert_eq!(cpu2.registers.get_register(1), 0x44);
        assert_eq!(cpu2.registers.get_i_register(), 0x300);
    }

    #[test]
    fn test_transfer_increments_i_quirk() {
        let mut cpu = cpu_with(&[0xA3, 0x00, 0xF1, 0x55]);
        cpu.quirks.transfer_increments_i = true;
        cpu.cycle().unwrap();
        cpu.cycle().unwrap();
        assert_eq!(cpu.registers.get_i_register(), 0x302);
    }

    #[test]
    fn test_add_i_flag_quirk() {
        // LD V0, 0x10; LD I, 0xFFF; ADD I, V0
        let rom = [0x60, 0x10, 0xAF, 0xFF, 0xF0, 0x1E];

        let mut cpu = cpu_with(&rom);
        for _ in 0..3 {
            cpu.cycle().unwrap();
        }
        assert_eq!(cpu.registers.get_i_register(), 0x00F);
        assert_eq!(cpu.registers.get_register(0xF), 0);

        let mut cpu = cpu_with(&rom);
        cpu.quirks.add_i_sets_vf = true;
        for _ in 0..3 {
            cpu.cycle().unwrap();
        }
        assert_eq!(cpu.registers.get_register(0xF), 1);
    }

    #[test]
    fn test_bcd_out_of_bounds() {
        // LD I, 0xFFE; LD B, V0
        let mut cpu = cpu_with(&[0xAF, 0xFE, 0xF0, 0x33]);
        cpu.cycle().unwrap();
        assert_eq!(
            cpu.cycle(),
            Err(VmError::MemoryOutOfBounds { addr: 0xFFE })
        );
    }

    #[test]
    fn test_wait_for_key() {
        // LD V0, K
        let mut cpu = cpu_with(&[0xF0, 0x0A]);

        assert_eq!(cpu.cycle().unwrap(), CpuState::WaitingForKey);
        assert_eq!(cpu.peripherals.memory.get_pointer(), 0x200);

        cpu.peripherals.input.press(0x7);
        assert_eq!(cpu.cycle().unwrap(), CpuState::Running);
        assert_eq!(cpu.registers.get_register(0), 0x7);
        assert_eq!(cpu.peripherals.memory.get_pointer(), 0x202);
    }

    #[test]
    fn test_skp_sknp() {
        // LD V0, 0x4; SKP V0
        let mut cpu = cpu_with(&[0x60, 0x04, 0xE0, 0x9E]);
        cpu.peripherals.input.press(0x4);
        cpu.cycle().unwrap();
        cpu.cycle().unwrap();
        assert_eq!(cpu.peripherals.memory.get_pointer(), 0x206);

        // LD V0, 0x4; SKNP V0
        let mut cpu = cpu_with(&[0x60, 0x04, 0xE0, 0xA1]);
        cpu.cycle().unwrap();
        cpu.cycle().unwrap();
        assert_eq!(cpu.peripherals.memory.get_pointer(), 0x206);
    }

    #[test]
    fn test_timers() {
        // LD V0, 0x03; LD DT, V0; LD ST, V0
        let mut cpu = cpu_with(&[0x60, 0x03, 0xF0, 0x15, 0xF0, 0x18]);
        for _ in 0..3 {
            cpu.cycle().unwrap();
        }
        assert_eq!(cpu.delay_timer.get_value(), 3);
        assert!(cpu.sound_active());

        for _ in 0..3 {
            cpu.update_timers();
        }
        assert_eq!(cpu.delay_timer.get_value(), 0);
        assert!(!cpu.sound_active());

        // A fourth tick stays at zero.
        cpu.update_timers();
        assert_eq!(cpu.delay_timer.get_value(), 0);
    }

    #[test]
    fn test_halt_is_sticky() {
        let mut cpu = cpu_with(&[0xFF, 0xFF, 0x60, 0x01]);
        assert_eq!(cpu.cycle().unwrap(), CpuState::Halted);
        assert!(cpu.halted());

        // Further cycles do nothing.
        assert_eq!(cpu.cycle().unwrap(), CpuState::Halted);
        assert_eq!(cpu.registers.get_register(0), 0);

        cpu.reset();
        assert!(!cpu.halted());
    }

    #[test]
    fn test_unknown_opcode_is_fatal() {
        let mut cpu = cpu_with(&[0x5A, 0xB1]);
        assert_eq!(
            cpu.cycle(),
            Err(VmError::UnknownOpcode {
                pc: 0x202,
                opcode: 0x5AB1
            })
        );
    }

    #[test]
    fn test_stack_depth() {
        // Sixteen nested CALLs starting at 0x200; each target holds
        // the next CALL.
        let mut rom = vec![];
        for idx in 0..16u16 {
            let target = 0x202 + idx * 2;
            rom.push(0x20 | (target >> 8) as u8);
            rom.push((target & 0xFF) as u8);
        }

        let mut cpu = cpu_with(&rom);
        for _ in 0..16 {
            cpu.cycle().unwrap();
        }
        assert_eq!(cpu.stack.get_pointer(), 16);

        // A 17th call overflows.
        cpu.peripherals.memory.set_pointer(0x200);
        assert_eq!(cpu.cycle(), Err(VmError::StackOverflow));
    }

    #[test]
    fn test_ret_on_empty_stack() {
        let mut cpu = cpu_with(&[0x00, 0xEE]);
        assert_eq!(cpu.cycle(), Err(VmError::StackUnderflow));
    }

    #[test]
    fn test_font_glyph_lookup() {
        // LD V0, 0x0A; LD F, V0; DRW V1, V2, 0x5
        let mut cpu = cpu_with(&[0x60, 0x0A, 0xF0, 0x29, 0xD1, 0x25]);
        for _ in 0..3 {
            cpu.cycle().unwrap();
        }
        assert_eq!(cpu.registers.get_i_register(), 0x050 + 5 * 0xA);
        assert!(!cpu.peripherals.screen.is_blank());
    }
}
