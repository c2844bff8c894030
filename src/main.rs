use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod common;
mod exact;
mod fuzzy;
mod index;
mod reconcile;
mod score;
mod workbook;

use common::MessageKind;

#[derive(Parser)]
#[command(
    name = "sheetmatch",
    version,
    about = "Match two Excel documents by contents and copy values between matched rows.",
    long_about = "sheetmatch looks up every row of a destination workbook in a source workbook by a match column and copies the configured data column across. The fuzzy subcommand falls back to similarity scoring when no exact key exists; the exact subcommand matches keys literally, optionally ignoring case. Changed cells are highlighted so the copied values can be audited."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match keys exactly, then fall back to fuzzy similarity scoring
    Fuzzy(fuzzy::FuzzyArgs),
    /// Match keys by exact equality only
    Exact(exact::ExactArgs),
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Fuzzy(args) => fuzzy::run(args),
        Commands::Exact(args) => exact::run(args),
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{}", common::fancy_message(MessageKind::Error, &format!("{err:#}")));
        process::exit(2);
    }
}
