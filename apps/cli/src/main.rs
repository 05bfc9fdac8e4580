//! bizintel CLI: prospect analysis over a local reference database.
//!
//! Matches companies against known customers, generates an analysis
//! narrative and extracts a ranked, structured record from it.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
