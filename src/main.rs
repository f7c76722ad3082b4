mod bootstrap;
mod cli;
mod commands;
mod scheduler;
mod seeds;
mod sync;

use std::fmt;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::warn;

// Use mimalloc to prevent memory bloat under sustained concurrent HTTP load.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use oparl_core::config::AppConfig;

use crate::cli::{Cli, Commands};

#[derive(Debug)]
struct Interrupted;

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "interrupted by user")
    }
}

impl std::error::Error for Interrupted {}

fn main() -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(async_main()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.downcast_ref::<Interrupted>().is_some() => {
            eprintln!("\ninterrupted by user");
            ExitCode::from(130)
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn async_main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config_str = std::fs::read_to_string(&cli.config).unwrap_or_else(|_| {
        warn!(path = %cli.config, "config file not found, using defaults");
        include_str!("../config/default.toml").to_string()
    });
    let mut config: AppConfig = toml::from_str(&config_str)?;
    config.apply_env_overrides();

    // `daemon` installs its own ctrl-c handler and stops gracefully, so it
    // runs outside this race; every other command is a one-shot task that
    // should abort with exit code 130 if interrupted mid-flight.
    if let Commands::Daemon { interval, full_sync_hour } = cli.command {
        return commands::daemon::run(config, interval, full_sync_hour).await;
    }

    tokio::select! {
        result = dispatch(cli.command, config) => result,
        _ = tokio::signal::ctrl_c() => Err(Interrupted.into()),
    }
}

async fn dispatch(command: Commands, config: AppConfig) -> Result<()> {
    match command {
        Commands::AddSource { url, name, priority } => {
            commands::add_source::run(config, url, name, priority).await
        }
        Commands::ListSources => commands::list_sources::run(config).await,
        Commands::Sync { body, source, all, full, concurrency } => {
            commands::sync::run(config, body, source, all, full, concurrency).await
        }
        Commands::Status => commands::status::run(config).await,
        Commands::Daemon { .. } => unreachable!("handled before dispatch"),
        Commands::TestConnection { url } => commands::test_connection::run(config, &url).await,
        Commands::InitSources { priority } => commands::init_sources::run(config, priority).await,
        Commands::Metrics => commands::metrics::run(config).await,
        Commands::CircuitBreakers => commands::circuit_breakers::run(config).await,
    }
}
