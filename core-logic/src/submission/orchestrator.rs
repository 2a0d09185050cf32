//! Submission Orchestrator - runs a chain of sequenced batch transactions
//!
//! For every batch, in order:
//!
//! 1. Take the counter's current sequence number
//! 2. Submit (optionally retrying transient submission errors, same number)
//! 3. Poll until FINALIZED, REJECTED or EXPIRED
//! 4. FINALIZED advances the counter; anything else goes through the
//!    failure policy, and continuing always resyncs the counter first
//!
//! Only one transaction is ever in flight for the account. With
//! `verify_sequence` on, the counter is checked against the ledger before
//! every follow-up batch.

use crate::config::SubmissionConfig;
use crate::error::{BatchError, CoreError, SubmissionError};
use crate::submission::checkpoint::{Checkpoint, CheckpointStore};
use crate::submission::policy::{self, FailureNotice, PolicyDecision};
use crate::submission::progress::{BatchOutcome, BatchRecord, RunProgress, RunSummary, StopReason};
use crate::submission::{
    split, Batch, ConfirmationPoller, SequenceCounter, SequenceNumber, SubmissionReceipt,
    TransactionState, TransactionSubmitter, TxHandle, WorkItem,
};
use crate::traits::{LedgerQuery, OperatorPrompt, PayloadBuilder, TransactionBackend};
use crate::utils::retry::RetryConfig;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const FETCH_BASE_DELAY_MS: u64 = 500;
const SUBMIT_BASE_DELAY_MS: u64 = 2000;

pub struct SubmissionOrchestrator<T: WorkItem> {
    config: SubmissionConfig,
    ledger: Arc<dyn LedgerQuery>,
    counter: SequenceCounter,
    submitter: TransactionSubmitter<T>,
    poller: ConfirmationPoller,
    submit_retry: RetryConfig,
    prompt: Option<Arc<dyn OperatorPrompt>>,
    checkpoint: Option<CheckpointStore>,
    cancel: CancellationToken,
    batch_offset: usize,
}

impl<T: WorkItem> SubmissionOrchestrator<T> {
    pub fn new(
        config: SubmissionConfig,
        account: impl Into<String>,
        backend: Arc<dyn TransactionBackend>,
        ledger: Arc<dyn LedgerQuery>,
        builder: Box<dyn PayloadBuilder<T>>,
    ) -> Self {
        let account = account.into();
        let counter = SequenceCounter::new(ledger.clone(), account.clone())
            .with_retry(RetryConfig::new(config.fetch_retries, FETCH_BASE_DELAY_MS));
        let submitter = TransactionSubmitter::new(backend, builder, account);
        let cancel = CancellationToken::new();
        let poller = ConfirmationPoller::new(
            ledger.clone(),
            config.poll_interval(),
            config.max_poll_attempts,
        )
        .with_cancellation(cancel.clone());
        let submit_retry = RetryConfig::new(config.submit_retries, SUBMIT_BASE_DELAY_MS);

        Self {
            config,
            ledger,
            counter,
            submitter,
            poller,
            submit_retry,
            prompt: None,
            checkpoint: None,
            cancel,
            batch_offset: 0,
        }
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn OperatorPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn with_checkpoint(mut self, store: CheckpointStore) -> Self {
        self.checkpoint = Some(store);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.poller = ConfirmationPoller::new(
            self.ledger.clone(),
            self.config.poll_interval(),
            self.config.max_poll_attempts,
        )
        .with_cancellation(cancel.clone());
        self.cancel = cancel;
        self
    }

    /// Numbers batches from `offset`, e.g. a checkpoint's `first_pending_batch`
    pub fn with_batch_offset(mut self, offset: usize) -> Self {
        self.batch_offset = offset;
        self
    }

    /// Overrides the backoff used between deliberate resubmissions
    pub fn with_submit_retry(mut self, retry: RetryConfig) -> Self {
        self.submit_retry = retry;
        self
    }

    pub fn config(&self) -> &SubmissionConfig {
        &self.config
    }

    /// The counter's last known value
    pub fn current_sequence(&self) -> Option<SequenceNumber> {
        self.counter.current()
    }

    /// Splits `items` into `chunk_size` batches and runs them
    ///
    /// Configuration is validated before anything touches the network.
    pub async fn run(&mut self, items: &[T]) -> Result<RunSummary<T>, CoreError> {
        self.config.validate()?;
        let batches: Vec<Batch<T>> = split(items, self.config.chunk_size)?.collect();
        self.run_batches(batches).await
    }

    /// Runs pre-built batches in the order given
    ///
    /// Lets callers batch within their own groups while keeping one
    /// sequence-number chain for the whole run.
    pub async fn run_batches(&mut self, batches: Vec<Batch<T>>) -> Result<RunSummary<T>, CoreError> {
        self.config.validate()?;

        let offset = self.batch_offset;
        let batches: Vec<Batch<T>> = if offset == 0 {
            batches
        } else {
            batches
                .into_iter()
                .map(|b| Batch::new(b.index() + offset, b.into_items()))
                .collect()
        };

        let mut progress = RunProgress::new();
        if batches.is_empty() {
            info!("Nothing to submit");
            let summary = progress.finish(StopReason::Exhausted);
            self.clear_checkpoint();
            return Ok(summary);
        }

        let total_items: usize = batches.iter().map(Batch::len).sum();
        info!(
            "Starting run for {}: {} items in {} batches (ceiling {}, policy {})",
            self.submitter.account(),
            total_items,
            batches.len(),
            self.config.max_batches,
            self.config.failure_policy
        );

        let initial = self.counter.fetch().await?;
        info!("Initial sequence number: {}", initial);

        let mut stop = StopReason::Exhausted;
        let mut stopped_at = batches.len();
        let mut first_failed: Option<usize> = None;

        for (pos, batch) in batches.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!("🛑 Cancellation requested, stopping before batch #{}", batch.number());
                stop = StopReason::Cancelled;
                stopped_at = pos;
                break;
            }
            if pos >= self.config.max_batches {
                warn!(
                    "Batch ceiling of {} reached, {} batches left",
                    self.config.max_batches,
                    batches.len() - pos
                );
                stop = StopReason::BatchCeiling;
                stopped_at = pos;
                break;
            }

            if self.config.verify_sequence && pos > 0 && self.counter.current().is_some() {
                if let Err(e) = self.counter.verify().await {
                    warn!(
                        "Could not verify sequence number before batch #{}: {}",
                        batch.number(),
                        e
                    );
                }
            }

            let sequence_number = match self.counter.current() {
                Some(value) => value,
                None => self.counter.fetch().await?,
            };

            debug!(
                "Batch #{}/{}: {} items with sequence number {}",
                batch.number(),
                batches.len(),
                batch.len(),
                sequence_number
            );

            let started = Instant::now();
            let result = self.attempt(batch, sequence_number).await;

            match result {
                Ok(handle) => {
                    self.counter.advance();
                    progress.record_success(BatchRecord {
                        number: batch.number(),
                        size: batch.len(),
                        sequence_number,
                        handle: Some(handle),
                        outcome: BatchOutcome::Finalized,
                        elapsed: started.elapsed(),
                    });
                    self.save_checkpoint(&progress, first_failed, &batches[pos + 1..]);

                    if pos + 1 < batches.len() {
                        self.post_confirm_pause().await;
                    }
                }
                Err((handle, batch_error)) => {
                    first_failed.get_or_insert(batch.index());
                    progress.record_failure(
                        BatchRecord {
                            number: batch.number(),
                            size: batch.len(),
                            sequence_number,
                            handle,
                            outcome: BatchOutcome::Failed(batch_error.clone()),
                            elapsed: started.elapsed(),
                        },
                        batch.items(),
                    );

                    if self.cancel.is_cancelled() {
                        warn!(
                            "Batch #{} interrupted by cancellation, its outcome is unknown",
                            batch.number()
                        );
                        self.save_checkpoint(&progress, first_failed, &batches[pos + 1..]);
                        stop = StopReason::Cancelled;
                        stopped_at = pos + 1;
                        break;
                    }

                    let notice = FailureNotice {
                        batch_number: batch.number(),
                        batch_size: batch.len(),
                        sequence_number,
                        error: batch_error.clone(),
                    };
                    error!("{}", notice.summary());

                    let decision =
                        policy::resolve(self.config.failure_policy, self.prompt.as_deref(), &notice)
                            .await;

                    if decision == PolicyDecision::Continue && batch_error.requires_resync() {
                        if let Err(e) = self.counter.resync().await {
                            error!("Could not resync sequence number, stopping: {}", e);
                            self.save_checkpoint(&progress, first_failed, &batches[pos + 1..]);
                            stop = StopReason::ResyncFailed(e);
                            stopped_at = pos + 1;
                            break;
                        }
                    }

                    self.save_checkpoint(&progress, first_failed, &batches[pos + 1..]);

                    if decision == PolicyDecision::Halt {
                        warn!("Halting after batch #{}", batch.number());
                        stop = StopReason::Halted;
                        stopped_at = pos + 1;
                        break;
                    }
                }
            }
        }

        for batch in &batches[stopped_at..] {
            progress.mark_unsubmitted(batch.items());
        }

        let first_pending = first_pending_batch(first_failed, &batches[stopped_at..]);
        let summary = progress.finish(stop);
        summary.log_tally();

        if summary.unsubmitted.is_empty() {
            self.clear_checkpoint();
        } else if let Some(store) = &self.checkpoint {
            let checkpoint =
                Checkpoint::new(first_pending, summary.last_confirmed, summary.unsubmitted.clone());
            if let Err(e) = store.save(&checkpoint) {
                error!("Failed to write checkpoint: {}", e);
            } else {
                info!(
                    "Checkpoint with {} pending items written to {}",
                    checkpoint.pending.len(),
                    store.path().display()
                );
            }
        }

        Ok(summary)
    }

    /// Submits one batch and waits for its terminal state
    async fn attempt(
        &self,
        batch: &Batch<T>,
        sequence_number: SequenceNumber,
    ) -> Result<TxHandle, (Option<TxHandle>, BatchError)> {
        let receipt = self
            .submit_with_retries(batch, sequence_number)
            .await
            .map_err(|e| (None, BatchError::from(e)))?;

        info!(
            "Batch #{} submitted as {}, waiting for finality",
            batch.number(),
            receipt.handle
        );

        let outcome = self.poller.await_terminal(&receipt).await;
        let handle = receipt.handle;

        match outcome.state {
            TransactionState::Finalized => Ok(handle),
            TransactionState::Rejected => {
                let reason = outcome
                    .detail
                    .unwrap_or_else(|| "no reason reported".to_string());
                Err((
                    Some(handle.clone()),
                    BatchError::TransactionRejected { handle, reason },
                ))
            }
            _ => Err((
                Some(handle.clone()),
                BatchError::TransactionExpired {
                    handle,
                    queries: outcome.queries,
                },
            )),
        }
    }

    /// Deliberate, logged resubmission of a payload that never reached the ledger
    async fn submit_with_retries(
        &self,
        batch: &Batch<T>,
        sequence_number: SequenceNumber,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let mut retry = 0;
        loop {
            match self.submitter.submit(batch, sequence_number).await {
                Ok(receipt) => return Ok(receipt),
                Err(e) if e.is_transient() && retry < self.config.submit_retries => {
                    let delay = self.submit_retry.delay_for(retry);
                    retry += 1;
                    warn!(
                        "Batch #{} submission failed ({}). Resubmitting with sequence number {} in {:?} (retry {}/{})",
                        batch.number(),
                        e,
                        sequence_number,
                        delay,
                        retry,
                        self.config.submit_retries
                    );

                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(e),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post_confirm_pause(&self) {
        let delay = self.config.post_confirm_delay();
        if delay.is_zero() {
            return;
        }

        debug!("Waiting {:?} before the next batch", delay);
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }

    fn save_checkpoint(
        &self,
        progress: &RunProgress<T>,
        first_failed: Option<usize>,
        rest: &[Batch<T>],
    ) {
        let Some(store) = &self.checkpoint else {
            return;
        };

        let mut pending = progress.unsubmitted().to_vec();
        for batch in rest {
            pending.extend_from_slice(batch.items());
        }

        let first_pending = first_pending_batch(first_failed, rest);
        let checkpoint = Checkpoint::new(first_pending, progress.last_confirmed(), pending);
        if let Err(e) = store.save(&checkpoint) {
            error!("Failed to write checkpoint: {}", e);
        }
    }

    fn clear_checkpoint(&self) {
        if let Some(store) = &self.checkpoint {
            if let Err(e) = store.clear() {
                warn!("Failed to remove checkpoint: {}", e);
            }
        }
    }
}

/// Index of the batch whose items lead the pending list
fn first_pending_batch<T>(first_failed: Option<usize>, rest: &[Batch<T>]) -> usize {
    first_failed
        .or_else(|| rest.first().map(Batch::index))
        .unwrap_or(0)
}
