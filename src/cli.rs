use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "oparl-ingestor", about = "OParl data synchronization service")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register a new OParl source
    AddSource {
        /// OParl system endpoint URL
        url: String,

        /// Display name (auto-detected from the system endpoint if omitted)
        #[arg(short, long)]
        name: Option<String>,

        /// Sync priority: 1=high, 2=medium, 3=low
        #[arg(short, long, default_value = "2")]
        priority: i16,
    },
    /// List all registered OParl sources
    ListSources,
    /// Synchronize OParl data
    Sync {
        /// Direct OParl Body URL(s), repeatable
        #[arg(short, long)]
        body: Vec<String>,

        /// Registered source to sync, by system URL (syncs every body under it)
        #[arg(short, long)]
        source: Option<String>,

        /// Sync every registered, active source
        #[arg(short, long)]
        all: bool,

        /// Ignore the last-sync timestamp and fetch everything
        #[arg(short, long)]
        full: bool,

        /// Number of bodies to sync concurrently
        #[arg(short = 'c', long, default_value = "4")]
        concurrency: usize,
    },
    /// Show database connectivity and entity counts
    Status,
    /// Run the scheduler: periodic incremental sync plus a once-daily full sync
    Daemon {
        /// Minutes between incremental sync ticks
        #[arg(short, long)]
        interval: Option<u64>,

        /// Hour of day (UTC, 0-23) at which to run the full sync
        #[arg(short = 'H', long)]
        full_sync_hour: Option<u32>,
    },
    /// Fetch an OParl system endpoint and report what it is
    TestConnection {
        /// OParl system or Body URL
        url: String,
    },
    /// Register the curated list of known German OParl sources
    InitSources {
        /// Only register sources at this priority tier (1, 2, or 3)
        #[arg(short, long)]
        priority: Option<i16>,
    },
    /// Print current metrics in Prometheus text format
    Metrics,
    /// Print circuit breaker state per host
    CircuitBreakers,
}
