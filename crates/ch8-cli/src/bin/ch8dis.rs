//! CHIP-8 disassembler CLI.

use std::path::PathBuf;
use std::process;

use argh::FromArgs;
use ch8_core::errors::CResult;
use ch8_core::peripherals::cartridge::Cartridge;

/// CHIP-8 disassembler
#[derive(FromArgs)]
struct Args {
    /// cartridge file
    #[argh(positional)]
    input: Option<PathBuf>,

    /// output file (omit for stdout)
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,

    /// prefix each line with address and raw opcode
    #[argh(switch)]
    verbose: bool,

    /// show version info
    #[argh(switch)]
    version: bool,
}

fn main() {
    let args: Args = argh::from_env();

    if args.version {
        println!("ch8dis {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    tracing_subscriber::fmt().compact().init();

    if let Err(error) = run(args) {
        eprintln!("error: {}", error);
        process::exit(1);
    }
}

fn run(args: Args) -> CResult {
    let input = match args.input {
        Some(input) => input,
        None => {
            eprintln!("error: no input file provided.");
            process::exit(1);
        }
    };

    let cartridge = Cartridge::load_from_path(&input)?;
    cartridge.write_disassembly_to_file(args.output, args.verbose)
}
