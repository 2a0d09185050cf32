//! Confirmation Poller - drives a submitted transaction to a terminal state
//!
//! ```text
//! SUBMITTED --(first status query)--> PENDING | FINALIZED | REJECTED
//! PENDING   --(status query)--------> PENDING | FINALIZED | REJECTED
//! PENDING   --(budget exhausted)-----> EXPIRED
//! ```
//!
//! Transport errors while querying count as PENDING and use up an attempt.
//! EXPIRED is an ordinary outcome, not an error: the transaction may still
//! finalize later, which is why the orchestrator resyncs after it.

use crate::submission::{SubmissionReceipt, TransactionState, TxHandle};
use crate::traits::LedgerQuery;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Terminal result of a poll
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    pub state: TransactionState,
    /// Status queries issued, zero when the receipt was already terminal
    pub queries: u32,
    /// Ledger-provided failure reason, if any
    pub detail: Option<String>,
}

impl PollOutcome {
    fn terminal(state: TransactionState, queries: u32, detail: Option<String>) -> Self {
        Self {
            state,
            queries,
            detail,
        }
    }
}

pub struct ConfirmationPoller {
    ledger: Arc<dyn LedgerQuery>,
    poll_interval: Duration,
    max_attempts: u32,
    cancel: CancellationToken,
}

impl ConfirmationPoller {
    pub fn new(ledger: Arc<dyn LedgerQuery>, poll_interval: Duration, max_attempts: u32) -> Self {
        Self {
            ledger,
            poll_interval,
            max_attempts,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Polls until a terminal state, honouring the receipt's own state first
    pub async fn await_terminal(&self, receipt: &SubmissionReceipt) -> PollOutcome {
        if let Some(state) = receipt.immediate_state.filter(|s| s.is_terminal()) {
            debug!("{} already {} at submission", receipt.handle, state);
            let detail = match state {
                TransactionState::Rejected => receipt_reason(&receipt.raw),
                _ => None,
            };
            return PollOutcome::terminal(state, 0, detail);
        }

        self.poll_handle(&receipt.handle).await
    }

    /// Queries `handle` up to `max_attempts` times, `poll_interval` apart
    pub async fn poll_handle(&self, handle: &TxHandle) -> PollOutcome {
        let mut state = TransactionState::Submitted;

        for attempt in 1..=self.max_attempts {
            match self.ledger.transaction_status(handle).await {
                Ok(report) => {
                    debug!(
                        "[Attempt {}/{}] {} is {}",
                        attempt, self.max_attempts, handle, report.state
                    );
                    if report.state.is_terminal() {
                        let detail = report.reason();
                        return PollOutcome::terminal(report.state, attempt, detail);
                    }
                    state = TransactionState::Pending;
                }
                Err(e) => {
                    warn!(
                        "[Attempt {}/{}] status query for {} failed: {}",
                        attempt, self.max_attempts, handle, e
                    );
                    state = TransactionState::Pending;
                }
            }

            if attempt == self.max_attempts {
                break;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    warn!("Cancelled while waiting for {} ({} after {} queries)", handle, state, attempt);
                    return PollOutcome::terminal(
                        TransactionState::Expired,
                        attempt,
                        Some("cancelled while polling".to_string()),
                    );
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        warn!(
            "{} still {} after {} status queries, treating as expired",
            handle, state, self.max_attempts
        );
        PollOutcome::terminal(TransactionState::Expired, self.max_attempts, None)
    }
}

fn receipt_reason(raw: &serde_json::Value) -> Option<String> {
    ["error", "errorMessage", "error_message"]
        .iter()
        .filter_map(|key| raw.get(*key).and_then(|v| v.as_str()))
        .find(|s| !s.trim().is_empty())
        .map(|s| s.trim().to_string())
}
