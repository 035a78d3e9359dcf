//! Command implementations

mod config;
mod materialize;
mod merge;
mod tile;

use crate::cli::{Cli, Commands};
use crate::output::OutputWriter;
use anyhow::Result;

/// Execute a CLI command
pub fn execute(cli: Cli) -> Result<()> {
    let output = OutputWriter::new(cli.json);

    match cli.command {
        Commands::Materialize(args) => materialize::execute(args, &output),
        Commands::Merge(args) => merge::execute(args, &output),
        Commands::Tile(args) => tile::execute(args, &output),
        Commands::Config(args) => config::execute(args, &output),
    }
}
