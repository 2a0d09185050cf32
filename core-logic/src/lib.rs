//! # Core Logic - Sequenced Batch Submission Engine
//!
//! Chain-agnostic pieces shared by the bulk submission tools: batching,
//! sequence-number tracking, confirmation polling, failure policies and
//! the ambient logging/retry/cancellation helpers.
//!
//! ## Modules
//!
//! - [`config`] - Run configuration and failure policy
//! - [`error`] - Typed error handling with thiserror
//! - [`submission`] - Batcher, sequence counter, submitter, poller, orchestrator
//! - [`traits`] - Collaborator interfaces implemented per chain
//! - [`utils`] - Logger, retry helpers, Ctrl+C wiring

pub mod config;
pub mod error;
pub mod submission;
pub mod traits;
pub(crate) mod utils;

// Selective exports - only public API types
pub use config::{FailurePolicy, SubmissionConfig};
pub use error::{
    BatchError, CheckpointError, ConfigError, CoreError, LedgerError, NetworkError,
    SubmissionError,
};
pub use submission::{
    split, Batch, BatchOutcome, BatchRecord, Checkpoint, CheckpointStore, ConfirmationPoller,
    ConsolePrompt, FailureNotice, PollOutcome, PolicyDecision, RunSummary, ScriptedPrompt,
    SequenceCounter, SequenceNumber, StatusReport, StopReason, SubmissionOrchestrator,
    SubmissionReceipt, TransactionPayload, TransactionState, TransactionSubmitter, TxHandle,
    WorkItem,
};
pub use traits::{LedgerQuery, MetadataSource, OperatorPrompt, PayloadBuilder, TransactionBackend};

// Utils are pub(crate) - only export specific public utilities
pub use utils::{cancel_on_ctrl_c, setup_logger, BATCH_RESULT_TARGET};

// Export retry utilities for chains and tests
pub use utils::retry::{is_transient_error, with_retry, RetryConfig};
