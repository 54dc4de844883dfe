//! CHIP-8 assembler CLI.

use std::path::PathBuf;
use std::process;

use argh::FromArgs;
use ch8_core::asm::Assembler;
use ch8_core::errors::CResult;

/// CHIP-8 assembler
#[derive(FromArgs)]
struct Args {
    /// source assembly file
    #[argh(positional)]
    input: Option<PathBuf>,

    /// output file (default: out.ch8)
    #[argh(option, short = 'o', default = "PathBuf::from(\"out.ch8\")")]
    output: PathBuf,

    /// verbose output
    #[argh(switch)]
    verbose: bool,

    /// show version info
    #[argh(switch)]
    version: bool,
}

fn main() {
    let args: Args = argh::from_env();

    if args.version {
        println!("ch8asm {}", env!("CARGO_PKG_VERSION"));
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

    if args.verbose {
        println!(
            "[verbose] assembling {} to {}",
            input.display(),
            args.output.display()
        );
    }

    let assembler = Assembler::from_path(&input)?;
    let cartridge = assembler.assemble_cartridge()?;
    cartridge.save_to_path(&args.output)?;

    if args.verbose {
        println!(
            "[verbose] wrote {} ({} bytes)",
            args.output.display(),
            cartridge.get_data().len()
        );
    } else {
        println!("assembled successfully to {}", args.output.display());
    }

    Ok(())
}
