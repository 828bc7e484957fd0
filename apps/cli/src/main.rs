//! dossier CLI: research a topic and write it up as DOCX and PDF reports.
//!
//! Works with no credentials at all; configured search and generation
//! backends are used when their API keys are present.

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
