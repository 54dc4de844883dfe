//! CHIP-8 headless emulator shell.

use std::path::PathBuf;
use std::process;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use argh::FromArgs;
use ch8_core::core::cpu::CpuState;
use ch8_core::core::random::QuadRandSource;
use ch8_core::debugger::{Debugger, DebuggerContext, DebuggerStream};
use ch8_core::emulator::Emulator;
use ch8_core::errors::CResult;
use ch8_core::peripherals::cartridge::Cartridge;

const FRAME_TIME: Duration = Duration::from_micros(16_667);

/// CHIP-8 emulator
#[derive(FromArgs)]
struct Args {
    /// subcommand
    #[argh(subcommand)]
    nested: SubCommands,
}

/// Subcommands
#[derive(FromArgs)]
#[argh(subcommand)]
enum SubCommands {
    /// Run command
    Run(RunCommand),
    /// Debug command
    Debug(DebugCommand),
    /// Version command
    Version(VersionCommand),
}

/// run a cartridge headless until it halts
#[derive(FromArgs)]
#[argh(subcommand, name = "run")]
struct RunCommand {
    /// cartridge path
    #[argh(positional)]
    file: PathBuf,

    /// instructions per 1/60 s frame
    #[argh(option, default = "15")]
    cycles_per_frame: u32,

    /// stop after this many frames
    #[argh(option)]
    max_frames: Option<u64>,

    /// trace output file (`-` for stdout)
    #[argh(option, short = 't')]
    trace: Option<PathBuf>,
}

/// debug a cartridge interactively
#[derive(FromArgs)]
#[argh(subcommand, name = "debug")]
struct DebugCommand {
    /// cartridge path
    #[argh(positional)]
    file: PathBuf,

    /// add breakpoint at address
    #[argh(option, short = 'b')]
    breakpoint: Vec<String>,
}

/// show version
#[derive(FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

fn main() {
    let args: Args = argh::from_env();

    tracing_subscriber::fmt().compact().init();
    seed_random();

    if let Err(error) = dispatch(args) {
        eprintln!("error: {}", error);
        process::exit(1);
    }
}

fn seed_random() {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    QuadRandSource::seed(u64::from(nanos));
}

fn dispatch(args: Args) -> CResult {
    match args.nested {
        SubCommands::Version(_) => {
            println!("ch8emu {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        SubCommands::Run(cmd) => run_command(cmd),
        SubCommands::Debug(cmd) => debug_command(cmd),
    }
}

fn run_command(cmd: RunCommand) -> CResult {
    let cartridge = Cartridge::load_from_path(&cmd.file)?;

    let mut emulator = Emulator::new();
    emulator.load_game(&cartridge)?;

    if let Some(trace) = &cmd.trace {
        emulator.set_tracefile(&trace.to_string_lossy())?;
    }

    let mut frames: u64 = 0;
    loop {
        let frame_start = Instant::now();

        match emulator.frame(cmd.cycles_per_frame)? {
            CpuState::Running => {}
            CpuState::Halted => {
                println!("machine halted after {} frames", frames);
                break;
            }
            CpuState::WaitingForKey => {
                println!("machine is waiting for a key with no keypad attached; stopping");
                break;
            }
        }

        frames += 1;
        if let Some(max) = cmd.max_frames {
            if frames >= max {
                println!("frame budget of {} reached", max);
                break;
            }
        }

        let elapsed = frame_start.elapsed();
        if elapsed < FRAME_TIME {
            std::thread::sleep(FRAME_TIME - elapsed);
        }
    }

    println!("{:?}", emulator.cpu);
    Ok(())
}

fn debug_command(cmd: DebugCommand) -> CResult {
    let cartridge = Cartridge::load_from_path(&cmd.file)?;

    let mut emulator = Emulator::new();
    emulator.load_game(&cartridge)?;

    let mut ctx = DebuggerContext::new();
    for addr in &cmd.breakpoint {
        ctx.register_breakpoint_str(addr)?;
    }

    let mut stream = DebuggerStream::new();
    stream.use_console(true);

    println!("debugging `{}`; type `help` for commands", cartridge.get_title());
    Debugger::new().run(&mut emulator, &mut ctx, &mut stream);

    Ok(())
}
