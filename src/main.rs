//! Polyclass - Main Entry Point
//!
//! Benchmarks a roster of classifiers on a NumPy dataset.

use clap::Parser;
use polyclass::cli::{init_logging, run, Cli};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.level);
    run(&cli)
}
