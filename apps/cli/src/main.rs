//! PrizeCraft CLI
//!
//! Command-line interface for the PrizeCraft settlement engine operator.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use prizecraft_core::{period_bounds, period_id, Entitlement, Timestamp};
use prizecraft_daemon::DaemonService;
use prizecraft_keystore::{expand_path, load_or_generate_signing_keypair};
use prizecraft_logging::init_logging;
use prizecraft_settings::Settings;
use prizecraft_settlement::{now_secs, MemoryStore, SnapshotStore};

/// PrizeCraft - contest and leaderboard reward settlement
#[derive(Parser)]
#[command(name = "prizecraft")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the settlement scheduler until interrupted
    Run {
        /// Run a single tick and exit
        #[arg(long)]
        once: bool,
    },

    /// Show the period containing a timestamp, and its bounds
    Period {
        /// Unix timestamp (defaults to now)
        #[arg(long)]
        at: Option<Timestamp>,
    },

    /// Create the claim signer key if missing and print its public key
    Keygen,

    /// List a participant's unclaimed leaderboard snapshots
    Claimable {
        /// Participant identity
        #[arg(short, long)]
        participant: String,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show the effective settings, optionally writing them out
    Config {
        /// Save the effective settings to the settings file
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { once } => run(settings, once).await?,
        Commands::Period { at } => show_period(&settings, at.unwrap_or_else(now_secs))?,
        Commands::Keygen => keygen(&settings)?,
        Commands::Claimable { participant, json } => claimable(&settings, &participant, json).await?,
        Commands::Config { write } => config(&settings, write)?,
    }

    Ok(())
}

fn load_settings(path: Option<&str>) -> Result<Settings> {
    let settings = match path {
        Some(path) => Settings::load_from(&expand_path(path)),
        None => Settings::load_or_default(),
    };
    settings.context("Failed to load settings")
}

async fn run(settings: Settings, once: bool) -> Result<()> {
    let daemon = Arc::new(DaemonService::with_mock_collaborators(settings)?);

    if once {
        let report = daemon.service().tick().await;
        println!("Contests processed: {}", report.contests.contests.len());
        match report.periods.current_period {
            Some(current) => println!("Current period: {}", current),
            None => println!("Current period: unavailable"),
        }
        println!("Periods settled: {:?}", report.periods.settled_periods());
        if let Some(e) = report.periods.error {
            println!("Period track skipped: {}", e);
        }
        return Ok(());
    }

    info!("Scheduler running every {:?}, press Ctrl+C to stop", daemon.tick_interval());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = {
        let daemon = daemon.clone();
        tokio::spawn(async move { daemon.run(shutdown_rx).await })
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    let _ = shutdown_tx.send(true);
    runner.await?;
    Ok(())
}

fn show_period(settings: &Settings, at: Timestamp) -> Result<()> {
    let history = &settings.periods.history;
    let period = period_id(at, history).context("Cannot compute period")?;
    let bounds = period_bounds(period, history).context("Cannot compute period bounds")?;

    println!("Timestamp: {}", at);
    println!("Period:    {}", period);
    println!("Start:     {}", bounds.start);
    println!("End:       {} (exclusive)", bounds.end);
    println!("Duration:  {}s", bounds.duration_secs);
    Ok(())
}

fn keygen(settings: &Settings) -> Result<()> {
    let path: PathBuf = settings.claims.signer_key_path();
    let keypair = load_or_generate_signing_keypair(&path)
        .with_context(|| format!("Failed to load signer key at {}", path.display()))?;

    println!("Signer key: {}", path.display());
    println!("Public key: {}", keypair.public_key_hex());
    Ok(())
}

async fn claimable(settings: &Settings, participant: &str, json: bool) -> Result<()> {
    let path = settings.storage.state_path();
    let store = MemoryStore::open(&path)
        .with_context(|| format!("Failed to open store at {}", path.display()))?;

    let mut rows = store.snapshots_for_participant(participant).await?;
    rows.retain(|s| !s.claimed);
    rows.sort_by_key(|s| s.period);

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No unclaimed rewards for {}", participant);
        return Ok(());
    }

    println!("{:>8}  {:>5}  {:>10}  Entitlement", "Period", "Rank", "Score");
    for row in rows {
        let entitlement = match row.entitlement {
            Entitlement::Fixed(amount) => format!("{} {}", amount, row.denomination),
            Entitlement::Deferred => format!("reward table ({})", row.denomination),
        };
        println!("{:>8}  {:>5}  {:>10}  {}", row.period, row.rank, row.score, entitlement);
    }
    Ok(())
}

fn config(settings: &Settings, write: bool) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(settings)?);
    if write {
        settings.save().context("Failed to save settings")?;
    }
    Ok(())
}
