mod altdisk;
mod cli;
mod config;
mod error;
mod exec;
mod health;
mod inventory;
mod journal;
mod mirror;
mod model;
mod orchestrate;
mod pair;
mod parse;
mod poll;
mod ssp;
mod storage;
mod update;

use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();
    if let Err(e) = cli::run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
