//! agriyield - Main Entry Point
//!
//! Trains and inspects district-level crop yield models.

use clap::Parser;

use agriyield::cli::{self, Cli};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agriyield=info".into()),
        )
        .init();

    let cli = Cli::parse();
    cli::run(cli)
}
