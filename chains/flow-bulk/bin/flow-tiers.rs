//! Assigns tiers to plays in open sets, one transaction per batch of a
//! single `(set, tier)` group.

use anyhow::{Context, Result};
use clap::Parser;
use core_logic::{CheckpointStore, cancel_on_ctrl_c, setup_logger};
use dotenv::dotenv;
use flow_bulk::RunArgs;
use flow_bulk::jobs::tiers::{
    TierAssignment, TierBuilder, fetch_mapping, group_batches, load_mapping_file,
};
use flow_bulk::jobs::{FlowContext, finish, resume_items};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Bulk play tier assignment on Flow", long_about = None)]
struct Args {
    #[command(flatten)]
    run: RunArgs,

    /// JSON mapping of set id to play id to tier
    #[arg(long)]
    mapping_file: Option<PathBuf>,

    /// Download the mapping instead of reading a file
    #[arg(long)]
    mapping_url: Option<String>,

    /// Tier transaction template
    #[arg(long)]
    tx_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    let mut config = args.run.load_config()?;
    let _log_guard = setup_logger(&config.log_dir, args.run.verbose);

    if let Some(path) = &args.mapping_file {
        config.tiers.mapping_file = path.clone();
        config.tiers.mapping_url = None;
    }
    if let Some(url) = &args.mapping_url {
        config.tiers.mapping_url = Some(url.clone());
    }
    if let Some(path) = &args.tx_path {
        config.tiers.tx_path = path.clone();
    }

    let context = FlowContext::from_config(&config)?;
    let store = CheckpointStore::new(config.checkpoint_path("tiers"));

    let (assignments, first_batch) =
        match resume_items::<TierAssignment>(&store, args.run.resume)? {
            Some(checkpoint) => (checkpoint.pending, checkpoint.first_pending_batch),
            None => {
                let assignments = match &config.tiers.mapping_url {
                    Some(url) => fetch_mapping(context.metadata.as_ref(), url).await?,
                    None => load_mapping_file(&config.tiers.mapping_file).with_context(|| {
                        format!(
                            "Failed to load tier mapping {}",
                            config.tiers.mapping_file.display()
                        )
                    })?,
                };
                (assignments, 0)
            }
        };

    if assignments.is_empty() {
        info!("Tier mapping is empty, nothing to assign");
        return Ok(());
    }

    let batches = group_batches(&assignments, config.submission.chunk_size)?;
    info!(
        "{} plays grouped into {} transactions",
        assignments.len(),
        batches.len()
    );

    if args.run.dry_run {
        println!(
            "Dry run: {} plays in {} transactions of up to {}",
            assignments.len(),
            batches.len().min(config.submission.max_batches),
            config.submission.chunk_size
        );
        for batch in batches.iter().take(config.submission.max_batches) {
            if let Some(first) = batch.items().first() {
                let plays: Vec<u32> = batch.items().iter().map(|a| a.play_id).collect();
                println!(
                    "  [Batch #{:04}] set {} tier {}: {:?}",
                    batch.number() + first_batch,
                    first.set_id,
                    first.tier,
                    plays
                );
            }
        }
        return Ok(());
    }

    let builder = TierBuilder::new(config.tiers.tx_path.clone());
    let mut orchestrator = context
        .orchestrator(&config, Box::new(builder), store, cancel_on_ctrl_c())
        .with_batch_offset(first_batch);

    let summary = match orchestrator.run_batches(batches).await {
        Ok(summary) => summary,
        Err(e) => {
            error!("Tier run aborted: {}", e);
            return Err(e.into());
        }
    };

    finish(&summary)
}
