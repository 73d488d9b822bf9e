//! Screener CLI binary.
//!
//! Acquires XBRL filings for a quarter and normalizes queued reports.

mod config;

use clap::{Parser, Subcommand};
use config::ScreenerConfig;
use screener::{EdgarClient, Period, Pipeline};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "screener")]
#[command(about = "EDGAR XBRL acquisition and fundamentals normalization", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for downloaded archives and extracted documents
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    /// SQLite database path
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// User agent sent to the SEC, e.g. "AppName/1.0 (contact@example.com)"
    #[arg(long, global = true)]
    user_agent: Option<String>,

    /// Connect and read timeout in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire every new filing in a quarterly full index
    Scrape {
        /// Index year
        #[arg(long)]
        year: i64,

        /// Index quarter (1-4)
        #[arg(long)]
        quarter: i64,
    },

    /// Normalize queued report files
    Normalize {
        /// Report files fetched per batch
        #[arg(long)]
        batch_size: Option<usize>,
    },
}

impl Cli {
    /// Applies flags over the loaded configuration.
    fn apply(&self, config: &mut ScreenerConfig) {
        if let Some(dir) = &self.store_dir {
            config.store_dir.clone_from(dir);
        }
        if let Some(database) = &self.database {
            config.database.clone_from(database);
        }
        if let Some(user_agent) = &self.user_agent {
            config.user_agent.clone_from(user_agent);
        }
        if let Some(timeout) = self.timeout_secs {
            config.timeout_secs = timeout;
        }
        if let Commands::Normalize {
            batch_size: Some(batch_size),
        } = self.command
        {
            config.batch_size = batch_size;
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing()?;

    let mut config = ScreenerConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);

    // Reject a bad period before touching the network or the stores.
    let period = match cli.command {
        Commands::Scrape { year, quarter } => Some(Period::new(year, quarter)?),
        Commands::Normalize { .. } => None,
    };

    let pipeline = open_pipeline(&config)?;

    match period {
        Some(period) => {
            let summary = pipeline.scrape(period).await?;
            println!("Acquisition for {period}:");
            println!("  records:      {}", summary.records);
            println!("  malformed:    {}", summary.malformed);
            println!("  overlong:     {}", summary.overlong);
            println!("  invalid CIK:  {}", summary.invalid_cik);
            println!("  cached:       {}", summary.cached);
            println!("  downloaded:   {}", summary.downloaded);
            println!("  extracted:    {}", summary.extracted);
            println!("  failed:       {}", summary.failed);
        }
        None => {
            let summary = pipeline.normalize().await?;
            println!("Normalization:");
            println!("  batches:  {}", summary.batches);
            println!("  valid:    {}", summary.valid);
            println!("  invalid:  {}", summary.invalid);
            println!("  skipped:  {}", summary.skipped);
        }
    }

    Ok(())
}

fn open_pipeline(config: &ScreenerConfig) -> Result<Pipeline, Box<dyn std::error::Error>> {
    if let Some(parent) = config.database.parent() {
        std::fs::create_dir_all(parent)?;
    }
    info!(
        store_dir = %config.store_dir.display(),
        database = %config.database.display(),
        "Opening stores"
    );

    let client = EdgarClient::new(&config.user_agent, Duration::from_secs(config.timeout_secs))?
        .with_archive_root(config.archive_root.as_str());
    let pipeline = Pipeline::open(client, &config.store_dir, &config.database)?
        .with_batch_size(config.batch_size);
    Ok(pipeline)
}
