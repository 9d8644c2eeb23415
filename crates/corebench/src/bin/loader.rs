use std::io;
use std::time::Duration;

use clap::Parser;
use corebench::loader::{Loader, format_word};
use corebench::program::ProgramImage;
use corebench::{LoaderArgs, LoaderCommand, ResultBlock};
use corebench_hw::specs::loader::MAX_WORDS;
use tracing::info;

/// Timeout of a single port read; the loader enforces the per-word deadline.
const PORT_POLL: Duration = Duration::from_millis(10);

fn open(args: &LoaderArgs) -> io::Result<Box<dyn serialport::SerialPort>> {
    serialport::new(&args.port, args.baud)
        .timeout(PORT_POLL)
        .open()
        .map_err(io::Error::from)
}

fn run(args: &LoaderArgs) -> Result<(), Box<dyn std::error::Error>> {
    match &args.command {
        LoaderCommand::Load { file, addr } => {
            let program = ProgramImage::read(file)?;
            program.check_fits(MAX_WORDS.saturating_sub(*addr) as usize)?;
            let mut loader = Loader::new(open(args)?);
            loader.load(*addr, program.words())?;
            println!("loaded {} words at {:#06x}", program.len(), addr);
        }
        LoaderCommand::Read {
            addr,
            count,
            decode,
        } => {
            let mut loader = Loader::new(open(args)?);
            let mut words = Vec::with_capacity(*count as usize);
            loader.read_with(*addr, *count, |addr, word| {
                println!("{}", format_word(addr, word));
                words.push(word);
            })?;
            if *decode {
                match ResultBlock::from_words(&words) {
                    Some(block) => println!("{}", block),
                    None => eprintln!("need 16 words to decode, got {}", words.len()),
                }
            }
        }
        LoaderCommand::Convert {
            input,
            output,
            words,
        } => {
            let mut image = ProgramImage::from_binary(&std::fs::read(input)?)?;
            if let Some(limit) = words {
                image.truncate(*limit);
            }
            std::fs::write(output, image.to_text())?;
            info!("wrote {} words to {}", image.len(), output.display());
        }
    }
    Ok(())
}

fn main() {
    let args = LoaderArgs::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
