//! docmem maintenance CLI entry point.
//!
//! Binary name: `docmem`
//!
//! Parses CLI arguments, loads the configuration, connects the adapter to the
//! document store and dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, maintenance};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,docmem_core=debug,docmem_infra=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Neither completions nor config display need a connection
    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            generate(*shell, &mut cmd, "docmem", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Config => {
            let (config, config_dir) = AppState::load_config(cli.config_dir.clone()).await?;
            return maintenance::show_config(&config, &config_dir, cli.json);
        }
        _ => {}
    }

    let state = AppState::init(cli.config_dir.clone()).await?;
    tracing::debug!(config_dir = %state.config_dir.display(), "state initialized");

    match cli.command {
        Commands::ReapExpired { now } => {
            maintenance::reap_expired(&state, now, cli.json, cli.quiet).await?;
        }
        Commands::EnsureIndex => {
            maintenance::ensure_index(&state, cli.json, cli.quiet).await?;
        }
        Commands::Info { collection } => {
            maintenance::info(&state, collection, cli.json).await?;
        }
        Commands::Collections => {
            maintenance::collections(&state, cli.json).await?;
        }
        Commands::Reset { force } => {
            maintenance::reset(&state, force, cli.json, cli.quiet).await?;
        }
        Commands::Config | Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}
