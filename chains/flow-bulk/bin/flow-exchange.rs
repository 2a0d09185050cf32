//! Exchanges every TopShot NFT of a child account for TSHOT, in sequenced
//! batches signed by the parent account.

use anyhow::{Context, Result};
use clap::Parser;
use core_logic::{CheckpointStore, cancel_on_ctrl_c, setup_logger, split};
use dotenv::dotenv;
use flow_bulk::RunArgs;
use flow_bulk::cadence::normalize_address;
use flow_bulk::jobs::exchange::{ExchangeBuilder, load_child_ids};
use flow_bulk::jobs::{FlowContext, finish, resume_items};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Bulk NFT to TSHOT exchange on Flow", long_about = None)]
struct Args {
    #[command(flatten)]
    run: RunArgs,

    /// Child account holding the NFTs
    #[arg(long)]
    child_address: Option<String>,

    /// Cadence script returning the child's collection ids
    #[arg(long)]
    script_path: Option<PathBuf>,

    /// Exchange transaction template
    #[arg(long)]
    tx_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    let mut config = args.run.load_config()?;
    let _log_guard = setup_logger(&config.log_dir, args.run.verbose);

    if let Some(child) = &args.child_address {
        config.exchange.child_address = Some(child.clone());
    }
    if let Some(path) = &args.script_path {
        config.exchange.ids_script = path.clone();
    }
    if let Some(path) = &args.tx_path {
        config.exchange.tx_path = path.clone();
    }

    let child = config
        .exchange
        .child_address
        .as_deref()
        .context("No child address given (--child-address or [exchange].child_address)")?;
    let child = normalize_address(child)?;

    let context = FlowContext::from_config(&config)?;
    let store = CheckpointStore::new(config.checkpoint_path(&format!("exchange-{}", child)));

    let (ids, first_batch) = match resume_items::<u64>(&store, args.run.resume)? {
        Some(checkpoint) => (checkpoint.pending, checkpoint.first_pending_batch),
        None => {
            let ids = load_child_ids(&context.cli, &config.exchange.ids_script, &child)
                .await
                .context("Failed to list the child's NFT ids")?;
            (ids, 0)
        }
    };

    if ids.is_empty() {
        info!("No NFTs to exchange for {}", child);
        return Ok(());
    }

    if args.run.dry_run {
        let batches: Vec<_> = split(&ids, config.submission.chunk_size)?.collect();
        println!(
            "Dry run: {} NFTs from {} in {} transactions of up to {}",
            ids.len(),
            child,
            batches.len().min(config.submission.max_batches),
            config.submission.chunk_size
        );
        for batch in batches.iter().take(config.submission.max_batches) {
            println!(
                "  [Batch #{:04}] {} NFTs: {:?}",
                batch.number() + first_batch,
                batch.len(),
                batch.items()
            );
        }
        return Ok(());
    }

    let builder = ExchangeBuilder::new(config.exchange.tx_path.clone(), child.clone());
    let mut orchestrator = context
        .orchestrator(&config, Box::new(builder), store, cancel_on_ctrl_c())
        .with_batch_offset(first_batch);

    let summary = match orchestrator.run(&ids).await {
        Ok(summary) => summary,
        Err(e) => {
            error!("Exchange run aborted: {}", e);
            return Err(e.into());
        }
    };

    finish(&summary)
}
