use anyhow::Result;
use butterfly_path::cli::{self, Cli};
use clap::Parser;

fn main() -> Result<()> {
    cli::run(Cli::parse())
}
