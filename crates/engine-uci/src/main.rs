//! UCI front-end binary
//!
//! Runs the UCI command loop by default; the `perft` subcommand runs a
//! move generation count for debugging and exits.

mod logger;
mod uci;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "engine-uci", about = "UCI chess engine", version)]
struct Cli {
    /// Transposition table size in MB
    #[arg(long, default_value_t = 256)]
    hash: usize,

    /// Log level on stderr (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: log::LevelFilter,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Count legal move sequences up to the given depth and exit
    Perft {
        depth: u32,
        /// Position to count from (FEN); defaults to the start position
        #[arg(long)]
        fen: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init(cli.log_level)?;

    match cli.command {
        Some(Command::Perft { depth, fen }) => run_perft(depth, fen.as_deref()),
        None => uci::run(cli.hash),
    }
}

fn run_perft(depth: u32, fen: Option<&str>) -> Result<()> {
    engine_core::init_sliders();
    let mut pos = engine_core::Position::new();
    match fen {
        Some(f) => pos.set_fen(f)?,
        None => pos.set_startpos(),
    }

    let start = std::time::Instant::now();
    for d in 0..=depth {
        let nodes = engine_core::perft(&mut pos, d);
        println!("perft({d}) = {nodes}  ({} ms)", start.elapsed().as_millis());
    }
    Ok(())
}
