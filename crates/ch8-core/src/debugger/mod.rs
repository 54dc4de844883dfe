//! Debugger.
//!
//! Interactive inspection over the public machine surface. The live
//! instruction-stream view decodes straight from memory, so the
//! listing stays truthful even for self-modifying programs.

mod breakpoints;
mod context;
mod stream;

pub use breakpoints::Breakpoints;
pub use context::{BadBreakpoint, DebuggerContext};
pub use stream::{DebuggerStream, StreamLine};

use rustyline::error::ReadlineError;

use crate::core::cpu::{Cpu, CpuState};
use crate::core::opcodes::OpCode;
use crate::core::types::{convert_hex_addr, convert_hex_byte, C8Addr, C8Byte, C8RegIdx};
use crate::emulator::Emulator;
use crate::peripherals::memory::{INITIAL_MEMORY_POINTER, MEMORY_SIZE};

/// Register kind.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum RegisterKind {
    /// General-purpose register.
    Register(C8RegIdx),
    /// I register.
    RegisterI,
    /// Stack slot.
    Stack(C8RegIdx),
    /// Stack pointer.
    StackPointer,
    /// Keypad slot.
    Input(C8RegIdx),
    /// Delay timer.
    DelayTimer,
    /// Sound timer.
    SoundTimer,
}

/// Debugger command.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Quit.
    Quit,
    /// Run until a breakpoint or a fault.
    Continue,
    /// Show current line.
    Where,
    /// Current line with context.
    List(u16),
    /// Complete listing.
    LongList,
    /// Dump a device.
    Dump(String),
    /// Read register.
    ReadRegister(RegisterKind),
    /// Read memory at offset.
    ReadMemory(C8Addr, C8Addr),
    /// Step one instruction.
    Step,
    /// Hold a key.
    PressKey(C8Byte),
    /// Release every key.
    ReleaseKeys,
    /// Add breakpoint.
    AddBreakpoint(C8Addr),
    /// Remove breakpoint.
    RemoveBreakpoint(C8Addr),
    /// List breakpoints.
    ListBreakpoints,
    /// Show help.
    Help,
    /// Empty input.
    Empty,
}

/// Debugger.
#[derive(Default)]
pub struct Debugger;

impl Debugger {
    /// Create new debugger.
    pub fn new() -> Self {
        Default::default()
    }

    /// Run the interactive loop until quit.
    ///
    /// # Arguments
    ///
    /// * `emulator` - Emulator instance.
    /// * `ctx` - Debugger context.
    /// * `stream` - Debugger stream.
    ///
    pub fn run(
        &self,
        emulator: &mut Emulator,
        ctx: &mut DebuggerContext,
        stream: &mut DebuggerStream,
    ) {
        ctx.set_address(emulator.cpu.peripherals.memory.get_pointer());
        ctx.has_moved = true;

        loop {
            if ctx.should_quit {
                break;
            }

            if ctx.is_stepping || ctx.is_continuing {
                self.execution_turn(emulator, ctx, stream);
                continue;
            }

            if ctx.has_moved {
                self.show_line_context(&emulator.cpu, ctx, stream, 1, 1);
                ctx.has_moved = false;
            }

            self.prompt(emulator, ctx, stream);
        }
    }

    // One execution turn while stepping or continuing.
    fn execution_turn(
        &self,
        emulator: &mut Emulator,
        ctx: &mut DebuggerContext,
        stream: &mut DebuggerStream,
    ) {
        if ctx.is_continuing && !ctx.breakpoint_hit {
            let pointer = emulator.cpu.peripherals.memory.get_pointer();
            if ctx.breakpoints.check_breakpoint(pointer) {
                stream.writeln_out(format!("breakpoint hit at 0x{:04X}", pointer));
                ctx.breakpoint_hit = true;
                ctx.has_moved = true;
                ctx.set_address(pointer);
                ctx.pause();
                return;
            }
        }

        match emulator.step() {
            Ok(CpuState::Running) => {}
            Ok(CpuState::Halted) => {
                stream.writeln_out("machine halted");
                ctx.pause();
            }
            Ok(CpuState::WaitingForKey) => {
                stream.writeln_out("waiting for a key press (use `press <key>`)");
                ctx.pause();
            }
            Err(error) => {
                stream.writeln_err(format!("execution error: {}", error));
                ctx.pause();
            }
        }

        ctx.breakpoint_hit = false;
        ctx.set_address(emulator.cpu.peripherals.memory.get_pointer());

        if ctx.is_stepping {
            ctx.is_stepping = false;
            ctx.has_moved = true;
        }
    }

    // Prompt until one command is handled or input closes.
    fn prompt(
        &self,
        emulator: &mut Emulator,
        ctx: &mut DebuggerContext,
        stream: &mut DebuggerStream,
    ) {
        loop {
            let readline = ctx.editor.readline("> ");

            match readline {
                Ok(line) => {
                    ctx.editor.add_history_entry(&line);

                    if let Some(command) = self.read_command(&line, stream) {
                        self.handle_command(emulator, ctx, stream, command);
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    ctx.should_quit = true;
                    break;
                }
                Err(error) => {
                    stream.writeln_err(format!("readline error: {}", error));
                }
            }
        }
    }

    /// Read command from a line.
    ///
    /// # Arguments
    ///
    /// * `cmd` - Command line.
    /// * `stream` - Debugger stream.
    ///
    /// # Returns
    ///
    /// * Command option.
    ///
    pub fn read_command(&self, cmd: &str, stream: &mut DebuggerStream) -> Option<Command> {
        let cmd_split: Vec<&str> = cmd.split_whitespace().collect();
        let command = cmd_split.first().copied().unwrap_or("");

        match command {
            "quit" | "q" => Some(Command::Quit),
            "continue" | "c" => Some(Command::Continue),
            "where" | "w" => Some(Command::Where),
            "longlist" | "ll" => Some(Command::LongList),
            "step" | "s" | "next" | "n" => Some(Command::Step),
            "list-bp" | "lb" => Some(Command::ListBreakpoints),
            "release" => Some(Command::ReleaseKeys),
            "help" | "h" => Some(Command::Help),
            "" => Some(Command::Empty),
            "list" | "l" => match cmd_split.len() {
                1 => Some(Command::List(2)),
                2 => match cmd_split[1].parse::<u16>() {
                    Ok(sz) => Some(Command::List(sz)),
                    Err(_) => {
                        stream.writeln_err(format!("bad context size: {}", cmd_split[1]));
                        None
                    }
                },
                _ => {
                    stream.writeln_out("usage: list [context_size=2]");
                    None
                }
            },
            "dump" | "d" => {
                if cmd_split.len() == 2 {
                    Some(Command::Dump(cmd_split[1].to_string()))
                } else {
                    stream.writeln_out("usage: dump device");
                    stream.writeln_out("  devices: memory, video, input, registers, stack, timers");
                    None
                }
            }
            "read-reg" | "rreg" => {
                if cmd_split.len() == 2 {
                    self.read_register_kind(cmd_split[1], stream)
                        .map(Command::ReadRegister)
                } else {
                    stream.writeln_out("usage: read-reg reg");
                    None
                }
            }
            "read-mem" | "rmem" => {
                if cmd_split.len() == 3 {
                    let addr = convert_hex_addr(cmd_split[1]);
                    let count = cmd_split[2].parse::<C8Addr>().ok();
                    match (addr, count) {
                        (Some(addr), Some(count)) => Some(Command::ReadMemory(addr, count)),
                        _ => {
                            stream.writeln_err(format!(
                                "bad arguments: {} {}",
                                cmd_split[1], cmd_split[2]
                            ));
                            None
                        }
                    }
                } else {
                    stream.writeln_out("usage: read-mem addr count");
                    None
                }
            }
            "press" | "p" => {
                if cmd_split.len() == 2 {
                    match convert_hex_byte(cmd_split[1]) {
                        Some(key) if key <= 0xF => Some(Command::PressKey(key)),
                        _ => {
                            stream.writeln_err(format!("bad key: {}", cmd_split[1]));
                            None
                        }
                    }
                } else {
                    stream.writeln_out("usage: press key (hex digit 0..F)");
                    None
                }
            }
            "add-bp" | "b" => self.parse_breakpoint(&cmd_split, stream, Command::AddBreakpoint),
            "rem-bp" | "rb" => self.parse_breakpoint(&cmd_split, stream, Command::RemoveBreakpoint),
            c => {
                stream.writeln_err(format!("unknown command: {}", c));
                None
            }
        }
    }

    fn parse_breakpoint(
        &self,
        cmd_split: &[&str],
        stream: &mut DebuggerStream,
        build: fn(C8Addr) -> Command,
    ) -> Option<Command> {
        if cmd_split.len() == 2 {
            match convert_hex_addr(cmd_split[1]) {
                Some(addr) => Some(build(addr)),
                None => {
                    stream.writeln_err(format!("bad address: {}", cmd_split[1]));
                    None
                }
            }
        } else {
            stream.writeln_out(format!("usage: {} addr", cmd_split[0]));
            None
        }
    }

    fn read_register_kind(
        &self,
        arg: &str,
        stream: &mut DebuggerStream,
    ) -> Option<RegisterKind> {
        let arg = arg.to_ascii_lowercase();

        match arg.as_str() {
            "i" => return Some(RegisterKind::RegisterI),
            "dt" => return Some(RegisterKind::DelayTimer),
            "st" => return Some(RegisterKind::SoundTimer),
            "sp" => return Some(RegisterKind::StackPointer),
            _ => (),
        }

        let mut chars = arg.chars();
        let family = chars.next()?;
        let idx: String = chars.collect();

        let idx = match C8RegIdx::from_str_radix(&idx, 16) {
            Ok(idx) if idx <= 0xF => idx,
            _ => {
                stream.writeln_err(format!("bad register index: {}", arg));
                return None;
            }
        };

        match family {
            'v' => Some(RegisterKind::Register(idx)),
            's' => Some(RegisterKind::Stack(idx)),
            'k' => Some(RegisterKind::Input(idx)),
            _ => {
                stream.writeln_err(format!("unknown register kind: {}", arg));
                None
            }
        }
    }

    /// Handle command.
    ///
    /// # Arguments
    ///
    /// * `emulator` - Emulator instance.
    /// * `ctx` - Debugger context.
    /// * `stream` - Debugger stream.
    /// * `command` - Command.
    ///
    pub fn handle_command(
        &self,
        emulator: &mut Emulator,
        ctx: &mut DebuggerContext,
        stream: &mut DebuggerStream,
        command: Command,
    ) {
        let cpu = &emulator.cpu;

        match command {
            Command::Dump(ref device) => match &device[..] {
                "memory" | "m" => stream.writeln_out(format!("{:?}", cpu.peripherals.memory)),
                "video" | "v" => stream.writeln_out(format!("{:?}", cpu.peripherals.screen)),
                "input" | "i" => stream.writeln_out(format!("{:?}", cpu.peripherals.input)),
                "registers" | "r" => stream.writeln_out(format!("{:?}", cpu.registers)),
                "stack" | "s" => stream.writeln_out(format!("{:?}", cpu.stack)),
                "timers" | "t" => {
                    stream.writeln_out(format!("DT: {:?}", cpu.delay_timer));
                    stream.writeln_out(format!("ST: {:?}", cpu.sound_timer));
                }
                _ => stream.writeln_out(format!("{:?}", cpu)),
            },
            Command::ReadRegister(kind) => match kind {
                RegisterKind::Register(idx) => {
                    stream.writeln_out(format!("V{:X} = {:02X}", idx, cpu.registers.get_register(idx)));
                }
                RegisterKind::RegisterI => {
                    stream.writeln_out(format!("I = {:04X}", cpu.registers.get_i_register()));
                }
                RegisterKind::Stack(idx) => {
                    stream.writeln_out(format!("S{:X} = {:04X}", idx, cpu.stack.peek(usize::from(idx))));
                }
                RegisterKind::StackPointer => {
                    stream.writeln_out(format!("SP = {:02X}", cpu.stack.get_pointer()));
                }
                RegisterKind::Input(idx) => {
                    stream.writeln_out(format!(
                        "K{:X} = {}",
                        idx,
                        cpu.peripherals.input.is_pressed(idx) as u8
                    ));
                }
                RegisterKind::DelayTimer => {
                    stream.writeln_out(format!("DT = {:02X}", cpu.delay_timer.get_value()));
                }
                RegisterKind::SoundTimer => {
                    stream.writeln_out(format!("ST = {:02X}", cpu.sound_timer.get_value()));
                }
            },
            Command::ReadMemory(addr, count) => {
                if usize::from(addr) + usize::from(count) > MEMORY_SIZE {
                    stream.writeln_err(format!("bad range: 0x{:04X} + {}", addr, count));
                } else {
                    stream.writeln_out(format!("memory at 0x{:04X} on {} byte(s):", addr, count));
                    stream.writeln_out(format!(
                        "{:02X?}",
                        cpu.peripherals.memory.read_data_at_offset(addr, count)
                    ));
                }
            }
            Command::Where => self.show_line(cpu, ctx, stream, ctx.address),
            Command::List(sz) => self.show_line_context(cpu, ctx, stream, sz, sz),
            Command::LongList => self.show_source(cpu, ctx, stream),
            Command::Step => ctx.is_stepping = true,
            Command::Continue => ctx.is_continuing = true,
            Command::PressKey(key) => {
                emulator.cpu.peripherals.input.press(key);
                stream.writeln_out(format!("key {:X} held", key));
            }
            Command::ReleaseKeys => {
                emulator.cpu.peripherals.input.release_all();
                stream.writeln_out("keys released");
            }
            Command::AddBreakpoint(addr) => {
                ctx.register_breakpoint(addr);
                stream.writeln_out(format!("breakpoint added at 0x{:04X}", addr));
            }
            Command::RemoveBreakpoint(addr) => {
                ctx.unregister_breakpoint(addr);
                stream.writeln_out(format!("breakpoint removed from 0x{:04X}", addr));
            }
            Command::ListBreakpoints => stream.writeln_out(format!("{:?}", ctx.breakpoints)),
            Command::Help => self.show_help(stream),
            Command::Quit => ctx.should_quit = true,
            Command::Empty => (),
        }
    }

    fn show_line(
        &self,
        cpu: &Cpu,
        ctx: &DebuggerContext,
        stream: &mut DebuggerStream,
        addr: C8Addr,
    ) {
        let opcode = cpu.peripherals.memory.read_opcode_at_address(addr);
        let opcode = OpCode::decode(opcode);
        let cursor = if ctx.address == addr { "-->" } else { "" };

        stream.writeln_out(format!(
            "{:04X}| {:3} {:20} ; {}",
            addr,
            cursor,
            opcode.to_assembly(),
            opcode.describe()
        ));
    }

    // Listing window around the current address; (1, 1) is the
    // default three-line view shown after every move.
    fn show_line_context(
        &self,
        cpu: &Cpu,
        ctx: &DebuggerContext,
        stream: &mut DebuggerStream,
        prev_size: u16,
        next_size: u16,
    ) {
        let base_addr = ctx.address;

        let min_limit = std::cmp::max(
            base_addr.saturating_sub(prev_size * 2),
            INITIAL_MEMORY_POINTER,
        );
        let max_limit = std::cmp::min(base_addr + next_size * 2, (MEMORY_SIZE - 2) as C8Addr);

        for addr in (min_limit..=max_limit).step_by(2) {
            self.show_line(cpu, ctx, stream, addr);
        }
    }

    fn show_source(&self, cpu: &Cpu, ctx: &DebuggerContext, stream: &mut DebuggerStream) {
        let end = cpu.peripherals.memory.get_end_pointer();
        for addr in (INITIAL_MEMORY_POINTER..end).step_by(2) {
            self.show_line(cpu, ctx, stream, addr);
        }
    }

    fn show_help(&self, stream: &mut DebuggerStream) {
        stream.writeln_out("available commands:");
        stream.writeln_out("  continue|c      - run until breakpoint or fault");
        stream.writeln_out("  step|s|next|n   - execute one instruction");
        stream.writeln_out("  where|w         - show current line");
        stream.writeln_out("  list|l [n]      - show current line with context");
        stream.writeln_out("  longlist|ll     - show complete listing");
        stream.writeln_out("  dump|d device   - dump device state");
        stream.writeln_out("  read-reg|rreg   - read register (v0..vf, i, sp, s0.., k0.., dt, st)");
        stream.writeln_out("  read-mem|rmem   - read memory at offset");
        stream.writeln_out("  press|p key     - hold a key (hex digit)");
        stream.writeln_out("  release         - release every key");
        stream.writeln_out("  add-bp|b addr   - add breakpoint");
        stream.writeln_out("  rem-bp|rb addr  - remove breakpoint");
        stream.writeln_out("  list-bp|lb      - list breakpoints");
        stream.writeln_out("  quit|q          - quit");
        stream.writeln_out("  help|h          - show this help");
    }
}
