//! Bulk jobs and the wiring they share.

pub mod exchange;
pub mod sets;
pub mod tiers;

use crate::access_api::AccessApiLedger;
use crate::config::FlowBulkConfig;
use crate::flow_cli::FlowCli;
use crate::metadata::HttpMetadataSource;
use anyhow::{Context, Result};
use core_logic::{
    Checkpoint, CheckpointStore, ConsolePrompt, FailurePolicy, PayloadBuilder, RunSummary,
    SubmissionOrchestrator, WorkItem,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Collaborators for one Flow account
pub struct FlowContext {
    pub cli: Arc<FlowCli>,
    pub metadata: Arc<HttpMetadataSource>,
    pub ledger: Arc<AccessApiLedger>,
    pub account: String,
}

impl FlowContext {
    pub fn from_config(config: &FlowBulkConfig) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let account = config.account_address()?;
        let cli = Arc::new(FlowCli::new(
            &config.flow_bin,
            &config.network,
            &config.signer,
            config.command_timeout(),
        ));
        let metadata = Arc::new(
            HttpMetadataSource::new(config.http_timeout()).context("Failed to build HTTP client")?,
        );
        let access_node = config.access_node_url()?;
        let ledger = Arc::new(AccessApiLedger::new(
            metadata.clone(),
            &access_node,
            config.key_index,
        )?);

        info!(
            "Flow {} | signer {} | account {} key #{} | access node {}",
            config.network, config.signer, account, config.key_index, access_node
        );

        Ok(Self {
            cli,
            metadata,
            ledger,
            account,
        })
    }

    /// Orchestrator for `builder`, with checkpointing and Ctrl+C wired in
    pub fn orchestrator<T: WorkItem>(
        &self,
        config: &FlowBulkConfig,
        builder: Box<dyn PayloadBuilder<T>>,
        checkpoint: CheckpointStore,
        cancel: CancellationToken,
    ) -> SubmissionOrchestrator<T> {
        let orchestrator = SubmissionOrchestrator::new(
            config.submission.clone(),
            self.account.clone(),
            self.cli.clone(),
            self.ledger.clone(),
            builder,
        )
        .with_checkpoint(checkpoint)
        .with_cancellation(cancel.clone());

        if config.submission.failure_policy == FailurePolicy::PromptOperator {
            orchestrator.with_prompt(Arc::new(ConsolePrompt::new().with_cancellation(cancel)))
        } else {
            orchestrator
        }
    }
}

/// The checkpoint to continue from, when resuming and one exists
///
/// Run its `pending` items with `with_batch_offset(first_pending_batch)`.
pub fn resume_items<T: WorkItem>(
    store: &CheckpointStore,
    resume: bool,
) -> Result<Option<Checkpoint<T>>> {
    if !resume {
        return Ok(None);
    }

    match store.load::<T>()? {
        Some(checkpoint) => {
            info!(
                "Resuming from {} at batch #{} ({} pending items, last confirmed sequence {:?}, saved {})",
                store.path().display(),
                checkpoint.first_pending_batch + 1,
                checkpoint.pending.len(),
                checkpoint.last_confirmed_sequence,
                checkpoint.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            Ok(Some(checkpoint))
        }
        None => {
            info!(
                "No checkpoint at {}, starting from scratch",
                store.path().display()
            );
            Ok(None)
        }
    }
}

/// Turns an incomplete run into a non-zero exit
pub fn finish<T>(summary: &RunSummary<T>) -> Result<()> {
    if summary.is_complete() {
        Ok(())
    } else {
        anyhow::bail!(
            "Run stopped ({}) with {} items not submitted",
            summary.stop_reason,
            summary.unsubmitted.len()
        )
    }
}
