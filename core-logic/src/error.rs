//! # Core Error Types
//!
//! Centralized error definitions for the core-logic crate.
//! All errors implement `std::error::Error` and `std::fmt::Display`.

use crate::submission::TxHandle;
use crate::utils::retry::is_transient_error;
use thiserror::Error;

/// Unified error type for core-logic operations.
///
/// This enum wraps all specific error types and provides a unified
/// error interface for the application layer.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Config(ConfigError),

    #[error(transparent)]
    Network(NetworkError),

    #[error("Submission error: {0}")]
    Submission(SubmissionError),

    #[error("Ledger query error: {0}")]
    Ledger(LedgerError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(CheckpointError),

    #[error("Unknown error: {message}")]
    Unknown { message: String },
}

impl From<ConfigError> for CoreError {
    fn from(e: ConfigError) -> Self {
        CoreError::Config(e)
    }
}

impl From<NetworkError> for CoreError {
    fn from(e: NetworkError) -> Self {
        CoreError::Network(e)
    }
}

impl From<SubmissionError> for CoreError {
    fn from(e: SubmissionError) -> Self {
        CoreError::Submission(e)
    }
}

impl From<LedgerError> for CoreError {
    fn from(e: LedgerError) -> Self {
        CoreError::Ledger(e)
    }
}

impl From<CheckpointError> for CoreError {
    fn from(e: CheckpointError) -> Self {
        CoreError::Checkpoint(e)
    }
}

/// Configuration-related errors.
///
/// Every variant is fatal at start-up and never retried.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Missing required configuration field: '{field}'")]
    MissingField { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("I/O error reading {path}: {msg}")]
    IoError { path: String, msg: String },

    #[error("Failed to parse {path}: {reason}")]
    ParseError { path: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Network and HTTP errors raised by metadata sources
#[derive(Error, Debug, Clone)]
pub enum NetworkError {
    #[error("Request timeout after {timeout_ms}ms to {endpoint}")]
    Timeout { timeout_ms: u64, endpoint: String },

    #[error("Connection refused to {endpoint}: {reason}")]
    ConnectionRefused { endpoint: String, reason: String },

    #[error("HTTP error {status_code} from {endpoint}: {body}")]
    HttpError {
        status_code: u16,
        endpoint: String,
        body: String,
    },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },
}

/// Synchronous failure of a submission, before the ledger accepted it.
///
/// No sequence number is consumed when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("transport failure: {reason}")]
    Transport { reason: String },

    #[error("backend rejected the transaction: {reason}")]
    Rejected { reason: String },

    #[error("malformed payload: {reason}")]
    MalformedPayload { reason: String },

    #[error("backend call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl SubmissionError {
    /// Whether a deliberate retry of the same payload is reasonable.
    pub fn is_transient(&self) -> bool {
        match self {
            SubmissionError::Timeout { .. } => true,
            SubmissionError::Transport { reason } => is_transient_error(reason),
            SubmissionError::Rejected { .. } | SubmissionError::MalformedPayload { .. } => false,
        }
    }
}

/// Transport or decoding failure of a ledger query
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("ledger unreachable: {reason}")]
    Unreachable { reason: String },

    #[error("malformed ledger response: {reason}")]
    Malformed { reason: String },
}

impl From<NetworkError> for LedgerError {
    fn from(e: NetworkError) -> Self {
        match e {
            NetworkError::InvalidResponse { reason, .. } => LedgerError::Malformed { reason },
            other => LedgerError::Unreachable {
                reason: other.to_string(),
            },
        }
    }
}

/// Why a single batch did not finalize
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error("transaction {handle} rejected: {reason}")]
    TransactionRejected { handle: TxHandle, reason: String },

    #[error("transaction {handle} not terminal after {queries} status queries")]
    TransactionExpired { handle: TxHandle, queries: u32 },
}

impl BatchError {
    /// Rejected and expired transactions leave the local counter untrustworthy.
    pub fn requires_resync(&self) -> bool {
        !matches!(self, BatchError::Submission(_))
    }
}

/// Checkpoint persistence errors
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("I/O error on checkpoint {path}: {msg}")]
    Io { path: String, msg: String },

    #[error("Corrupt checkpoint {path}: {reason}")]
    Corrupt { path: String, reason: String },
}
