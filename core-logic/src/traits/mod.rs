//! Collaborator interfaces consumed by the submission engine.
//!
//! Chains plug in their own transport by implementing these traits; the
//! engine never talks to the network directly.

use crate::error::{LedgerError, NetworkError, SubmissionError};
use crate::submission::{
    Batch, FailureNotice, PolicyDecision, SequenceNumber, StatusReport, SubmissionReceipt,
    TransactionPayload, TxHandle,
};
use async_trait::async_trait;

/// Source of auxiliary JSON metadata
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<serde_json::Value, NetworkError>;
}

/// Signs and sends a transaction on behalf of an account
#[async_trait]
pub trait TransactionBackend: Send + Sync {
    /// Exactly one network submission per call
    async fn submit(
        &self,
        payload: &TransactionPayload,
        account: &str,
    ) -> Result<SubmissionReceipt, SubmissionError>;
}

/// Read-only view of the ledger
#[async_trait]
pub trait LedgerQuery: Send + Sync {
    /// Next sequence number the ledger expects from `account`
    async fn sequence_number(&self, account: &str) -> Result<SequenceNumber, LedgerError>;

    async fn transaction_status(&self, handle: &TxHandle) -> Result<StatusReport, LedgerError>;
}

/// Turns a batch of work items into transaction arguments
pub trait PayloadBuilder<T>: Send + Sync {
    fn build(
        &self,
        batch: &Batch<T>,
        sequence_number: SequenceNumber,
    ) -> Result<TransactionPayload, SubmissionError>;
}

/// Asks a human whether a run should go on after a failed batch
#[async_trait]
pub trait OperatorPrompt: Send + Sync {
    async fn decide(&self, notice: &FailureNotice) -> PolicyDecision;
}
