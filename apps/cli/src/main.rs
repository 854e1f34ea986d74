//! SiteAssist CLI — retrieval-augmented knowledge base for your own site.
//!
//! Crawls the site's sitemap into a capped document/chunk index, embeds
//! chunks through OpenAI, and answers questions grounded in the result.

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
