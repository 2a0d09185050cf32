use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// What the orchestrator does after a batch fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop the run at the first failed batch
    #[default]
    Halt,
    /// Resynchronize the sequence number and move on to the next batch
    ResyncAndContinue,
    /// Suspend and ask the operator to continue or halt
    PromptOperator,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailurePolicy::Halt => "halt",
            FailurePolicy::ResyncAndContinue => "resync-and-continue",
            FailurePolicy::PromptOperator => "prompt-operator",
        };
        f.write_str(name)
    }
}

impl FromStr for FailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "halt" => Ok(FailurePolicy::Halt),
            "resync-and-continue" | "resync" | "continue" => Ok(FailurePolicy::ResyncAndContinue),
            "prompt-operator" | "prompt" => Ok(FailurePolicy::PromptOperator),
            other => Err(ConfigError::invalid(
                "failure_policy",
                format!("unknown policy '{other}' (expected halt, resync-and-continue or prompt-operator)"),
            )),
        }
    }
}

/// Knobs for one orchestration run
///
/// Defaults match the bulk scripts this tool replaces: 40 items per
/// transaction, 5 second polling for up to 60 attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// Work items per transaction
    pub chunk_size: usize,
    /// Upper bound on batches attempted in one run
    pub max_batches: usize,
    /// Delay between status queries in milliseconds
    pub poll_interval_ms: u64,
    /// Status queries before a transaction is treated as expired
    pub max_poll_attempts: u32,
    /// Extra pause after each finalized transaction in milliseconds
    pub post_confirm_delay_ms: u64,
    pub failure_policy: FailurePolicy,
    /// Deliberate resubmissions of a batch after a transient submission error
    pub submit_retries: u32,
    /// Retries for sequence number lookups
    pub fetch_retries: u32,
    /// Compare the local sequence number with the ledger before each
    /// follow-up batch and adopt the ledger value on drift
    pub verify_sequence: bool,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            chunk_size: 40,
            max_batches: 9999,
            poll_interval_ms: 5000,
            max_poll_attempts: 60,
            post_confirm_delay_ms: 0,
            failure_policy: FailurePolicy::Halt,
            submit_retries: 0,
            fetch_retries: 3,
            verify_sequence: false,
        }
    }
}

impl SubmissionConfig {
    /// Rejects values that would make a run meaningless
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::invalid("chunk_size", "must be at least 1"));
        }
        if self.max_batches == 0 {
            return Err(ConfigError::invalid("max_batches", "must be at least 1"));
        }
        if self.max_poll_attempts == 0 {
            return Err(ConfigError::invalid(
                "max_poll_attempts",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn post_confirm_delay(&self) -> Duration {
        Duration::from_millis(self.post_confirm_delay_ms)
    }

    /// Worst-case wait for one confirmation
    pub fn confirmation_budget(&self) -> Duration {
        self.poll_interval() * self.max_poll_attempts
    }
}
