//! Emulator.
//!
//! Host-loop facade over the CPU. The host drives `step` (or `frame`
//! for a whole 1/60 s slice) and owns the pacing; instruction rate and
//! timer rate stay decoupled.

use std::fs::File;
use std::io::Write;

use tracing::debug;

use crate::core::cpu::{Cpu, CpuState};
use crate::core::opcodes::OpCode;
use crate::errors::{CResult, VmError};
use crate::peripherals::cartridge::Cartridge;

/// Tracefile handle.
pub enum TracefileHandle {
    /// File.
    File(File),
    /// Stdout.
    Stdout,
}

/// CHIP-8 emulator.
#[derive(Default)]
pub struct Emulator {
    /// CPU handle.
    pub cpu: Cpu,

    tracefile: Option<TracefileHandle>,
}

impl Emulator {
    /// Create new emulator.
    pub fn new() -> Self {
        Default::default()
    }

    /// Enable an execution trace.
    ///
    /// # Arguments
    ///
    /// * `path` - Output path; `-` traces to stdout.
    ///
    /// # Returns
    ///
    /// * Empty result.
    ///
    pub fn set_tracefile(&mut self, path: &str) -> CResult {
        self.tracefile = if path == "-" {
            Some(TracefileHandle::Stdout)
        } else {
            Some(TracefileHandle::File(File::create(path)?))
        };

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
    pub fn load_game(&mut self, cartridge: &Cartridge) -> Result<(), VmError> {
        debug!("loading game `{}`", cartridge.get_title());
        self.cpu.load_cartridge(cartridge)
    }

    /// Reset the machine and reload the cartridge.
    ///
    /// # Arguments
    ///
    /// * `cartridge` - Cartridge.
    ///
    /// # Returns
    ///
    /// * Empty result, or `RomTooLarge`.
    ///
    pub fn reset_game(&mut self, cartridge: &Cartridge) -> Result<(), VmError> {
        self.load_game(cartridge)
    }

    /// Execute one instruction.
    ///
    /// # Returns
    ///
    /// * Machine state, or a fatal error.
    ///
    pub fn step(&mut self) -> Result<CpuState, VmError> {
        self.trace_step();
        self.cpu.cycle()
    }

    /// Execute one 1/60 s frame: `cycles` instructions, then one timer
    /// tick.
    ///
    /// # Arguments
    ///
    /// * `cycles` - Instructions per frame.
    ///
    /// # Returns
    ///
    /// * Machine state after the frame, or a fatal error.
    ///
    pub fn frame(&mut self, cycles: u32) -> Result<CpuState, VmError> {
        let mut state = CpuState::Running;

        for _ in 0..cycles {
            state = self.step()?;
            if state == CpuState::Halted {
                break;
            }
        }

        self.cpu.update_timers();
        Ok(state)
    }

    /// Run until the halt instruction, a key wait, or the cycle budget
    /// runs out.
    ///
    /// A key wait stops the run because nothing feeds the keypad here.
    ///
    /// # Arguments
    ///
    /// * `max_cycles` - Cycle budget.
    ///
    /// # Returns
    ///
    /// * Last machine state, or a fatal error.
    ///
    pub fn run_till_halt(&mut self, max_cycles: usize) -> Result<CpuState, VmError> {
        let mut state = CpuState::Running;

        for _ in 0..max_cycles {
            state = self.step()?;
            if state != CpuState::Running {
                break;
            }
        }

        Ok(state)
    }

    fn trace_step(&mut self) {
        if self.tracefile.is_none() || self.cpu.halted() {
            return;
        }

        let pointer = self.cpu.peripherals.memory.get_pointer();
        let word = self.cpu.peripherals.memory.read_opcode();
        let opcode = OpCode::decode(word);
        let line = format!(
            "{:04X}| ({:04X})  {:20} ; {}",
            pointer,
            word,
            opcode.to_assembly(),
            opcode.describe()
        );

        if let Some(handle) = self.tracefile.as_mut() {
            match handle {
                TracefileHandle::Stdout => println!("{}", line),
                TracefileHandle::File(file) => {
                    // Trace output is best effort.
                    let _ = writeln!(file, "{}", line);
                }
            }
        }
    }
}
