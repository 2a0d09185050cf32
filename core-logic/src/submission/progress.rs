use crate::error::{BatchError, LedgerError};
use crate::submission::{SequenceNumber, TxHandle};
use crate::utils::logger::BATCH_RESULT_TARGET;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    Finalized,
    Failed(BatchError),
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchOutcome::Finalized)
    }
}

/// One attempted batch, as it ends up in the summary
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRecord {
    /// One-based batch number
    pub number: usize,
    pub size: usize,
    pub sequence_number: SequenceNumber,
    /// Missing when the submission itself failed
    pub handle: Option<TxHandle>,
    pub outcome: BatchOutcome,
    pub elapsed: Duration,
}

impl BatchRecord {
    /// Emits the per-batch summary line
    pub fn log(&self) {
        let handle = self
            .handle
            .as_ref()
            .map(|h| h.as_str())
            .unwrap_or("-");

        match &self.outcome {
            BatchOutcome::Finalized => info!(
                target: BATCH_RESULT_TARGET,
                "[Batch #{:04}] SUCCESS | {} items | seq {} | tx {} | {:.1}s",
                self.number,
                self.size,
                self.sequence_number,
                handle,
                self.elapsed.as_secs_f64()
            ),
            BatchOutcome::Failed(e) => info!(
                target: BATCH_RESULT_TARGET,
                "[Batch #{:04}] FAILED | {} items | seq {} | tx {} | {:.1}s | {}",
                self.number,
                self.size,
                self.sequence_number,
                handle,
                self.elapsed.as_secs_f64(),
                e
            ),
        }
    }
}

/// Why a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    /// Every batch was attempted
    Exhausted,
    /// `max_batches` reached with work left
    BatchCeiling,
    /// Failure policy said stop
    Halted,
    Cancelled,
    /// The ledger could not be re-read after a failure
    ResyncFailed(LedgerError),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Exhausted => f.write_str("all batches attempted"),
            StopReason::BatchCeiling => f.write_str("batch ceiling reached"),
            StopReason::Halted => f.write_str("halted by failure policy"),
            StopReason::Cancelled => f.write_str("cancelled"),
            StopReason::ResyncFailed(e) => write!(f, "sequence resync failed: {}", e),
        }
    }
}

/// Mutable record of a run in flight
#[derive(Debug)]
pub struct RunProgress<T> {
    records: Vec<BatchRecord>,
    unsubmitted: Vec<T>,
    last_confirmed: Option<SequenceNumber>,
    started: Instant,
}

impl<T: Clone> RunProgress<T> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            unsubmitted: Vec::new(),
            last_confirmed: None,
            started: Instant::now(),
        }
    }

    pub fn record_success(&mut self, record: BatchRecord) {
        self.last_confirmed = Some(record.sequence_number);
        record.log();
        self.records.push(record);
    }

    /// Records a failed batch and keeps its items for a later run
    pub fn record_failure(&mut self, record: BatchRecord, items: &[T]) {
        record.log();
        self.records.push(record);
        self.unsubmitted.extend_from_slice(items);
    }

    /// Items never attempted (ceiling, halt, cancellation)
    pub fn mark_unsubmitted(&mut self, items: &[T]) {
        self.unsubmitted.extend_from_slice(items);
    }

    pub fn attempted(&self) -> usize {
        self.records.len()
    }

    pub fn successes(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn failures(&self) -> usize {
        self.attempted() - self.successes()
    }

    pub fn last_confirmed(&self) -> Option<SequenceNumber> {
        self.last_confirmed
    }

    pub fn unsubmitted(&self) -> &[T] {
        &self.unsubmitted
    }

    pub fn records(&self) -> &[BatchRecord] {
        &self.records
    }

    pub fn finish(self, stop_reason: StopReason) -> RunSummary<T> {
        RunSummary {
            records: self.records,
            unsubmitted: self.unsubmitted,
            last_confirmed: self.last_confirmed,
            stop_reason,
            elapsed: self.started.elapsed(),
        }
    }
}

impl<T: Clone> Default for RunProgress<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Final report of a run
#[derive(Debug, Clone)]
pub struct RunSummary<T> {
    pub records: Vec<BatchRecord>,
    /// Items of failed and never-attempted batches, in input order of batches
    pub unsubmitted: Vec<T>,
    pub last_confirmed: Option<SequenceNumber>,
    pub stop_reason: StopReason,
    pub elapsed: Duration,
}

impl<T> RunSummary<T> {
    pub fn attempted(&self) -> usize {
        self.records.len()
    }

    pub fn successes(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn failures(&self) -> usize {
        self.attempted() - self.successes()
    }

    pub fn is_complete(&self) -> bool {
        self.unsubmitted.is_empty() && self.stop_reason == StopReason::Exhausted
    }

    /// Emits the final tally
    pub fn log_tally(&self) {
        let rate = if self.attempted() > 0 {
            (self.successes() as f64 / self.attempted() as f64) * 100.0
        } else {
            0.0
        };

        info!(
            target: BATCH_RESULT_TARGET,
            "Run finished ({}) in {:.1}s | Attempted: {} | Success: {} | Fail: {} | Un-submitted items: {} | Success Rate: {:.2}%",
            self.stop_reason,
            self.elapsed.as_secs_f64(),
            self.attempted(),
            self.successes(),
            self.failures(),
            self.unsubmitted.len(),
            rate
        );

        if let Some(seq) = self.last_confirmed {
            info!(target: BATCH_RESULT_TARGET, "Last confirmed sequence number: {}", seq);
        }
        if !self.unsubmitted.is_empty() {
            warn!(
                "{} items were not submitted; rerun with the checkpoint to pick them up",
                self.unsubmitted.len()
            );
        }
    }
}
