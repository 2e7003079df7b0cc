//! Auction ledger batch binary
//!
//! Loads the config, then for every realm assembles the snapshot source,
//! opens the ledger from its saved state and replays every snapshot not
//! yet processed.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use auction_ledger::config::{CheckpointMode, LedgerConfig};
use auction_ledger::ledger::AuctionLedger;
use auction_ledger::output::OutputWriter;
use auction_ledger::runner::BatchRunner;
use auction_ledger::source::realm_source;
use auction_ledger::state::StateStore;
use auction_types::ids::Realm;
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Replay auction house snapshots into the ledger")]
struct Args {
    #[arg(long, env = "AUCTION_LEDGER_CONFIG", default_value = "auction-ledger.toml")]
    config: PathBuf,

    /// Process only these realms (`region:slug`); repeatable.
    #[arg(long = "realm")]
    realms: Vec<String>,

    /// Override the configured checkpoint mode.
    #[arg(long, value_enum)]
    checkpoint: Option<CheckpointArg>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CheckpointArg {
    PerSnapshot,
    EndOfBatch,
}

impl From<CheckpointArg> for CheckpointMode {
    fn from(arg: CheckpointArg) -> Self {
        match arg {
            CheckpointArg::PerSnapshot => CheckpointMode::PerSnapshot,
            CheckpointArg::EndOfBatch => CheckpointMode::EndOfBatch,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run(Args::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            error!(error = %format!("{:#}", e), "auction ledger failed");
            ExitCode::FAILURE
        }
    }
}

/// Returns `false` when some snapshots had to be skipped.
fn run(args: Args) -> Result<bool> {
    let mut config = LedgerConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if !args.realms.is_empty() {
        config.realms = args.realms.clone();
        config.validate()?;
    }
    if let Some(checkpoint) = args.checkpoint {
        config.checkpoint = checkpoint.into();
    }
    config.ensure_dirs().context("creating result directory")?;

    info!(
        config = %args.config.display(),
        realms = ?config.realms,
        checkpoint = ?config.checkpoint,
        "auction ledger starting"
    );

    let mut clean = true;
    for realm in config.parsed_realms()? {
        let bad = process_realm(&config, &realm)
            .with_context(|| format!("processing realm {}", realm))?;
        if bad > 0 {
            warn!(realm = %realm, bad, "realm finished with skipped snapshots");
            clean = false;
        }
    }
    Ok(clean)
}

fn process_realm(config: &LedgerConfig, realm: &Realm) -> Result<usize> {
    let source = realm_source(
        &config.download_dir,
        &config.backup_dir,
        realm,
        config.prefer_archives,
    )?;
    let naming = config.naming();
    let store = StateStore::new(
        &config.result_dir,
        realm.clone(),
        naming.clone(),
        config.compress_state,
    );
    let output = OutputWriter::new(&config.result_dir, naming);

    let mut ledger = AuctionLedger::open(store)?;
    let report = BatchRunner::new(&source, &output, config.checkpoint).run(&mut ledger)?;
    Ok(report.bad.len())
}
