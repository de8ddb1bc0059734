//! wavclass CLI
//!
//! Command-line interface for training and querying the audio classifier.

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use wavclass::cli::{commands, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    debug!("wavclass v{}", env!("CARGO_PKG_VERSION"));

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Labels { dataset } => commands::labels(&dataset, &config),
        Commands::Train { dataset, json } => commands::train(&dataset, json, &config),
        Commands::Predict {
            dataset,
            files,
            threshold,
            json,
        } => commands::predict(&dataset, &files, threshold, json, &config),
        Commands::Interactive {
            dataset,
            input_dir,
            threshold,
        } => commands::interactive(&dataset, &input_dir, threshold, &config),
    }
}
