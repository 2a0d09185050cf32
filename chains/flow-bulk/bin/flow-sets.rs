//! Per-set maintenance on Flow: default tiers and set locking, one
//! transaction per set.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use core_logic::{
    CheckpointStore, PayloadBuilder, WorkItem, cancel_on_ctrl_c, setup_logger,
};
use dotenv::dotenv;
use flow_bulk::jobs::sets::{
    DefaultTierBuilder, LockSetBuilder, SetDefaultTier, fetch_default_tiers, load_default_tiers,
    one_per_batch, parse_set_ranges,
};
use flow_bulk::jobs::{FlowContext, finish, resume_items};
use flow_bulk::{FlowBulkConfig, RunArgs};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Per-set default tiers and locking on Flow", long_about = None)]
struct Args {
    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    job: Job,
}

#[derive(Subcommand, Debug)]
enum Job {
    /// Set the default tier of each set
    DefaultTiers {
        /// JSON object of set id to tier, or the tiers API list
        #[arg(long)]
        mapping_file: Option<PathBuf>,

        /// Download the default tiers instead of reading a file
        #[arg(long)]
        mapping_url: Option<String>,

        /// Default tier transaction template
        #[arg(long)]
        tx_path: Option<PathBuf>,
    },
    /// Lock sets so no new plays can be added
    Lock {
        /// Inclusive ranges, e.g. 1-73,75-99,118
        #[arg(long)]
        sets: Option<String>,

        /// Lock transaction template
        #[arg(long)]
        tx_path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    let mut config = args.run.load_config()?;
    let _log_guard = setup_logger(&config.log_dir, args.run.verbose);

    match &args.job {
        Job::DefaultTiers {
            mapping_file,
            mapping_url,
            tx_path,
        } => {
            if let Some(path) = mapping_file {
                config.sets.default_tier_file = path.clone();
                config.sets.default_tier_url = None;
            }
            if let Some(url) = mapping_url {
                config.sets.default_tier_url = Some(url.clone());
            }
            if let Some(path) = tx_path {
                config.sets.default_tier_tx = path.clone();
            }
            default_tiers(&args.run, &config).await
        }
        Job::Lock { sets, tx_path } => {
            if let Some(sets) = sets {
                config.sets.lock_sets = Some(sets.clone());
            }
            if let Some(path) = tx_path {
                config.sets.lock_tx = path.clone();
            }
            lock_sets(&args.run, &config).await
        }
    }
}

async fn default_tiers(run: &RunArgs, config: &FlowBulkConfig) -> Result<()> {
    let context = FlowContext::from_config(config)?;
    let store = CheckpointStore::new(config.checkpoint_path("default-tiers"));

    let (defaults, first_batch) = match resume_items::<SetDefaultTier>(&store, run.resume)? {
        Some(checkpoint) => (checkpoint.pending, checkpoint.first_pending_batch),
        None => {
            let defaults = match &config.sets.default_tier_url {
                Some(url) => fetch_default_tiers(context.metadata.as_ref(), url).await?,
                None => load_default_tiers(&config.sets.default_tier_file).with_context(|| {
                    format!(
                        "Failed to load default tiers {}",
                        config.sets.default_tier_file.display()
                    )
                })?,
            };
            (defaults, 0)
        }
    };

    let builder = DefaultTierBuilder::new(config.sets.default_tier_tx.clone());
    run_per_set(run, config, &context, store, builder, defaults, first_batch).await
}

async fn lock_sets(run: &RunArgs, config: &FlowBulkConfig) -> Result<()> {
    let context = FlowContext::from_config(config)?;
    let store = CheckpointStore::new(config.checkpoint_path("lock-sets"));

    let (set_ids, first_batch) = match resume_items::<u32>(&store, run.resume)? {
        Some(checkpoint) => (checkpoint.pending, checkpoint.first_pending_batch),
        None => {
            let spec = config
                .sets
                .lock_sets
                .as_deref()
                .context("No sets to lock (--sets or [sets].lock_sets)")?;
            (parse_set_ranges(spec)?, 0)
        }
    };

    let builder = LockSetBuilder::new(config.sets.lock_tx.clone());
    run_per_set(run, config, &context, store, builder, set_ids, first_batch).await
}

async fn run_per_set<T, B>(
    run: &RunArgs,
    config: &FlowBulkConfig,
    context: &FlowContext,
    store: CheckpointStore,
    builder: B,
    items: Vec<T>,
    first_batch: usize,
) -> Result<()>
where
    T: WorkItem,
    B: PayloadBuilder<T> + 'static,
{
    if items.is_empty() {
        info!("No sets to update");
        return Ok(());
    }

    let batches = one_per_batch(&items);

    if run.dry_run {
        let shown = batches.len().min(config.submission.max_batches);
        println!("Dry run: {} sets in {} transactions", items.len(), shown);
        for batch in batches.iter().take(shown) {
            println!("  [Batch #{:04}] {:?}", batch.number() + first_batch, batch.items());
        }
        return Ok(());
    }

    let mut orchestrator = context
        .orchestrator(config, Box::new(builder), store, cancel_on_ctrl_c())
        .with_batch_offset(first_batch);

    let summary = match orchestrator.run_batches(batches).await {
        Ok(summary) => summary,
        Err(e) => {
            error!("Per-set run aborted: {}", e);
            return Err(e.into());
        }
    };

    finish(&summary)
}
