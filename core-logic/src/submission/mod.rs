//! # Sequenced Batch Submission
//!
//! Pushes an ordered collection of work items to a ledger as a chain of
//! transactions, one per batch, each carrying the account's next sequence
//! number. A transaction must reach a terminal state before the next batch
//! is submitted.
//!
//! ## Components
//!
//! - [`split`] - fixed-size, order-preserving batching
//! - [`SequenceCounter`] - locally cached sequence number with ledger resync
//! - [`TransactionSubmitter`] - one backend call per batch
//! - [`ConfirmationPoller`] - bounded status polling up to a terminal state
//! - [`SubmissionOrchestrator`] - drives the run and applies the failure policy
//! - [`CheckpointStore`] - optional JSON checkpoint for resumable runs

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub mod batcher;
pub mod checkpoint;
pub mod orchestrator;
pub mod policy;
pub mod poller;
pub mod progress;
pub mod sequence;
pub mod submitter;

pub use batcher::{split, Batch, Batches};
pub use checkpoint::{Checkpoint, CheckpointStore};
pub use orchestrator::SubmissionOrchestrator;
pub use policy::{ConsolePrompt, FailureNotice, PolicyDecision, ScriptedPrompt};
pub use poller::{ConfirmationPoller, PollOutcome};
pub use progress::{BatchOutcome, BatchRecord, RunProgress, RunSummary, StopReason};
pub use sequence::SequenceCounter;
pub use submitter::TransactionSubmitter;

/// Per-account transaction counter value
pub type SequenceNumber = u64;

/// Anything that can ride inside a batch and be written to a checkpoint
pub trait WorkItem: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> WorkItem for T where T: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Backend-assigned transaction identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHandle(String);

impl TxHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a submitted transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionState {
    /// Accepted by the backend, not yet observed on the ledger
    Submitted,
    Pending,
    Finalized,
    Rejected,
    /// Poll budget ran out without a terminal answer
    Expired,
}

impl TransactionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransactionState::Finalized | TransactionState::Rejected | TransactionState::Expired
        )
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionState::Submitted => "SUBMITTED",
            TransactionState::Pending => "PENDING",
            TransactionState::Finalized => "FINALIZED",
            TransactionState::Rejected => "REJECTED",
            TransactionState::Expired => "EXPIRED",
        };
        f.write_str(name)
    }
}

/// Status answer from the ledger, with the raw response kept for diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub state: TransactionState,
    pub raw: serde_json::Value,
}

impl StatusReport {
    pub fn new(state: TransactionState, raw: serde_json::Value) -> Self {
        Self { state, raw }
    }

    /// Best-effort human readable failure reason out of the raw response
    pub fn reason(&self) -> Option<String> {
        ["error_message", "errorMessage", "error"]
            .iter()
            .filter_map(|key| self.raw.get(*key))
            .filter_map(|v| v.as_str())
            .find(|s| !s.trim().is_empty())
            .map(|s| s.trim().to_string())
    }
}

/// What the backend hands back on a successful submission
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReceipt {
    pub handle: TxHandle,
    /// Some backends wait for the outcome and report it right away
    pub immediate_state: Option<TransactionState>,
    pub raw: serde_json::Value,
}

impl SubmissionReceipt {
    pub fn new(handle: TxHandle) -> Self {
        Self {
            handle,
            immediate_state: None,
            raw: serde_json::Value::Null,
        }
    }

    pub fn with_state(mut self, state: TransactionState) -> Self {
        self.immediate_state = Some(state);
        self
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = raw;
        self
    }
}

/// Everything a backend needs to sign and send one transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionPayload {
    /// Transaction template (e.g. a Cadence file)
    pub template: PathBuf,
    /// Encoded transaction arguments, in order
    pub arguments: Vec<serde_json::Value>,
    pub sequence_number: SequenceNumber,
    pub item_count: usize,
}
