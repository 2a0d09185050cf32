//! Sequence Counter - locally cached account sequence number
//!
//! The ledger is the authority on an account's sequence number. This counter
//! keeps an optimistic local copy so consecutive batches do not need a lookup
//! each, and falls back to the ledger whenever an outcome is uncertain:
//!
//! 1. **Fetch**: read the number from the ledger (with retries)
//! 2. **Advance**: +1 after a transaction finalizes
//! 3. **Resync**: re-read from the ledger after a rejected or expired
//!    transaction, never guessing whether the number was consumed
//! 4. **Verify**: optional check against the ledger between batches, for
//!    backends that pick the number themselves
//!
//! Mutation needs `&mut self`, so whoever owns the counter is its only writer.

use crate::error::LedgerError;
use crate::submission::SequenceNumber;
use crate::traits::LedgerQuery;
use crate::utils::retry::{with_retry, RetryConfig};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct SequenceCounter {
    ledger: Arc<dyn LedgerQuery>,
    account: String,
    retry: RetryConfig,
    current: Option<SequenceNumber>,
}

impl SequenceCounter {
    pub fn new(ledger: Arc<dyn LedgerQuery>, account: impl Into<String>) -> Self {
        Self {
            ledger,
            account: account.into(),
            retry: RetryConfig::default(),
            current: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Reads the account's sequence number from the ledger and caches it
    pub async fn fetch(&mut self) -> Result<SequenceNumber, LedgerError> {
        let ledger = self.ledger.clone();
        let account = self.account.clone();
        let operation = format!("sequence lookup for {}", account);

        let value = with_retry(&self.retry, &operation, || {
            let ledger = ledger.clone();
            let account = account.clone();
            async move { ledger.sequence_number(&account).await }
        })
        .await?;

        debug!("Sequence number for {} is {}", self.account, value);
        self.current = Some(value);
        Ok(value)
    }

    /// Last known value, without touching the ledger
    pub fn current(&self) -> Option<SequenceNumber> {
        self.current
    }

    /// Moves past a number the ledger has finalized
    pub fn advance(&mut self) {
        match self.current {
            Some(value) => self.current = Some(value + 1),
            None => warn!(
                "advance() on {} before the first fetch, ignoring",
                self.account
            ),
        }
    }

    /// Throws the local value away and re-reads it from the ledger
    pub async fn resync(&mut self) -> Result<SequenceNumber, LedgerError> {
        let predicted = self.current.take();
        let fresh = self.fetch().await?;

        match predicted {
            Some(p) if p != fresh => info!(
                "Resynced sequence number for {}: predicted {}, ledger says {}",
                self.account, p, fresh
            ),
            _ => debug!("Resynced sequence number for {}: {}", self.account, fresh),
        }

        Ok(fresh)
    }

    /// Compares the local value with the ledger and adopts the ledger's
    ///
    /// Returns the drift as `(expected, actual)` when they differ. On error
    /// the local value is kept.
    pub async fn verify(
        &mut self,
    ) -> Result<Option<(SequenceNumber, SequenceNumber)>, LedgerError> {
        let expected = self.current;
        let actual = self.fetch().await?;

        match expected {
            Some(expected) if expected != actual => {
                warn!(
                    "Sequence number drift for {}: expected {}, ledger reports {}",
                    self.account, expected, actual
                );
                Ok(Some((expected, actual)))
            }
            _ => Ok(None),
        }
    }
}
