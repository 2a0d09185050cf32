//! Ledger queries over the Flow Access REST API
//!
//! - `GET /v1/accounts/{address}?expand=keys` for the proposal key's
//!   sequence number
//! - `GET /v1/transaction_results/{id}` for transaction status
//!
//! A transaction is only FINALIZED once it is sealed without an error
//! message. Sealed with an error, failed execution, or expired all map to
//! REJECTED; every other status is still PENDING.

use async_trait::async_trait;
use core_logic::{
    ConfigError, LedgerError, LedgerQuery, MetadataSource, SequenceNumber, StatusReport,
    TransactionState, TxHandle,
};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

pub const MAINNET_ACCESS_NODE: &str = "https://rest-mainnet.onflow.org";
pub const TESTNET_ACCESS_NODE: &str = "https://rest-testnet.onflow.org";
pub const EMULATOR_ACCESS_NODE: &str = "http://localhost:8888";

/// Default REST endpoint for a flow.json network name
pub fn default_access_node(network: &str) -> Option<&'static str> {
    match network {
        "mainnet" => Some(MAINNET_ACCESS_NODE),
        "testnet" => Some(TESTNET_ACCESS_NODE),
        "emulator" => Some(EMULATOR_ACCESS_NODE),
        _ => None,
    }
}

pub struct AccessApiLedger {
    source: Arc<dyn MetadataSource>,
    base: Url,
    key_index: u32,
}

impl AccessApiLedger {
    pub fn new(
        source: Arc<dyn MetadataSource>,
        base_url: &str,
        key_index: u32,
    ) -> Result<Self, ConfigError> {
        let mut base = Url::parse(base_url)
            .map_err(|e| ConfigError::invalid("access_node", format!("{}: {}", base_url, e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            source,
            base,
            key_index,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, LedgerError> {
        self.base.join(path).map_err(|e| LedgerError::Malformed {
            reason: format!("bad endpoint {}: {}", path, e),
        })
    }
}

#[async_trait]
impl LedgerQuery for AccessApiLedger {
    async fn sequence_number(&self, account: &str) -> Result<SequenceNumber, LedgerError> {
        let address = account.trim_start_matches("0x");
        let url = self.endpoint(&format!("v1/accounts/{}?expand=keys", address))?;
        let body = self.source.get_json(url.as_str()).await?;
        parse_sequence_number(&body, self.key_index)
    }

    async fn transaction_status(&self, handle: &TxHandle) -> Result<StatusReport, LedgerError> {
        let url = self.endpoint(&format!("v1/transaction_results/{}", handle.as_str()))?;
        let body = self.source.get_json(url.as_str()).await?;
        parse_transaction_result(body)
    }
}

/// Pulls `keys[key_index].sequence_number` out of an account response
pub fn parse_sequence_number(body: &Value, key_index: u32) -> Result<SequenceNumber, LedgerError> {
    let keys = body
        .get("keys")
        .and_then(Value::as_array)
        .ok_or_else(|| LedgerError::Malformed {
            reason: "account response has no keys".to_string(),
        })?;

    let key = keys
        .iter()
        .find(|k| as_u64(k.get("index")) == Some(key_index as u64))
        .or_else(|| keys.get(key_index as usize))
        .ok_or_else(|| LedgerError::Malformed {
            reason: format!("account has no key with index {}", key_index),
        })?;

    if key.get("revoked").and_then(Value::as_bool) == Some(true) {
        return Err(LedgerError::Malformed {
            reason: format!("key {} is revoked", key_index),
        });
    }

    as_u64(key.get("sequence_number")).ok_or_else(|| LedgerError::Malformed {
        reason: format!("key {} has no readable sequence_number", key_index),
    })
}

/// Maps a transaction result to a state, keeping the raw body
pub fn parse_transaction_result(body: Value) -> Result<StatusReport, LedgerError> {
    let status = body
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| LedgerError::Malformed {
            reason: "transaction result has no status".to_string(),
        })?;

    let has_error = body
        .get("error_message")
        .and_then(Value::as_str)
        .is_some_and(|m| !m.trim().is_empty());
    let execution_failed = body.get("execution").and_then(Value::as_str) == Some("Failure");

    let state = match status.to_ascii_uppercase().as_str() {
        "SEALED" if has_error || execution_failed => TransactionState::Rejected,
        "SEALED" => TransactionState::Finalized,
        "EXPIRED" => TransactionState::Rejected,
        _ if execution_failed => TransactionState::Rejected,
        _ => TransactionState::Pending,
    };

    Ok(StatusReport::new(state, body))
}

/// The REST API encodes uint64 values as strings
fn as_u64(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}
