//! mdchunk CLI: split Markdown documents into retrieval chunks.
//!
//! Chunks are printed as JSON so they can be piped straight into an
//! embedding or indexing step.

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
