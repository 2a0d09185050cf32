//! Transaction backend that shells out to the `flow` CLI
//!
//! `flow transactions send` signs with a flow.json account alias and, by
//! default, waits for the transaction to seal before printing its result.
//! The printed status is therefore usually terminal already, and the
//! poller only has to step in when the CLI returns early.
//!
//! The CLI picks the proposal key's sequence number itself, so the number
//! the engine expects is only logged here. Drift is caught by
//! `verify_sequence`, which compares the counter with the access node
//! before each follow-up batch.

use crate::cadence;
use async_trait::async_trait;
use core_logic::{
    SubmissionError, SubmissionReceipt, TransactionBackend, TransactionPayload, TransactionState,
    TxHandle, is_transient_error,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum FlowCliError {
    #[error("failed to start {bin}: {reason}")]
    Spawn { bin: String, reason: String },

    #[error("flow CLI timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("flow CLI exited with {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("unexpected flow CLI output: {reason}")]
    InvalidOutput { reason: String },
}

impl From<FlowCliError> for SubmissionError {
    fn from(e: FlowCliError) -> Self {
        match e {
            FlowCliError::Timeout { timeout_ms } => SubmissionError::Timeout { timeout_ms },
            FlowCliError::Failed { stderr, .. } if !is_transient_error(&stderr) => {
                SubmissionError::Rejected { reason: stderr }
            }
            other => SubmissionError::Transport {
                reason: other.to_string(),
            },
        }
    }
}

/// Raw output of one CLI invocation
#[derive(Debug)]
struct CliOutput {
    success: bool,
    code: Option<i32>,
    stdout: String,
    stderr: String,
}

#[derive(Debug, Clone)]
pub struct FlowCli {
    bin: PathBuf,
    network: String,
    signer: String,
    timeout: Duration,
}

impl FlowCli {
    pub fn new(
        bin: impl Into<PathBuf>,
        network: impl Into<String>,
        signer: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            bin: bin.into(),
            network: network.into(),
            signer: signer.into(),
            timeout,
        }
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn signer(&self) -> &str {
        &self.signer
    }

    async fn run(&self, args: &[String]) -> Result<CliOutput, FlowCliError> {
        debug!("Running {} {}", self.bin.display(), args.join(" "));

        let child = Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FlowCliError::Spawn {
                bin: self.bin.display().to_string(),
                reason: e.to_string(),
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| FlowCliError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            })?
            .map_err(|e| FlowCliError::Spawn {
                bin: self.bin.display().to_string(),
                reason: e.to_string(),
            })?;

        Ok(CliOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    /// Runs a read-only script and returns its JSON-Cadence result
    pub async fn execute_script(
        &self,
        script: &Path,
        args: &[String],
    ) -> Result<Value, FlowCliError> {
        let mut cli_args = vec![
            "scripts".to_string(),
            "execute".to_string(),
            script.display().to_string(),
        ];
        cli_args.extend(args.iter().cloned());
        cli_args.extend([
            format!("--network={}", self.network),
            "--output=json".to_string(),
        ]);

        let output = self.run(&cli_args).await?;
        if !output.success {
            return Err(FlowCliError::Failed {
                code: output.code,
                stderr: output.stderr,
            });
        }

        serde_json::from_str(output.stdout.trim()).map_err(|e| FlowCliError::InvalidOutput {
            reason: format!("script result is not JSON: {}", e),
        })
    }

    /// Ids of every NFT in the collection the script inspects
    pub async fn collection_ids(
        &self,
        script: &Path,
        address: &str,
    ) -> Result<Vec<u64>, FlowCliError> {
        let value = self
            .execute_script(script, &[address.to_string()])
            .await?;
        cadence::decode_u64_array(&value).map_err(|reason| FlowCliError::InvalidOutput { reason })
    }

    fn send_args(&self, payload: &TransactionPayload) -> Result<Vec<String>, SubmissionError> {
        let args_json = serde_json::to_string(&payload.arguments).map_err(|e| {
            SubmissionError::MalformedPayload {
                reason: format!("cannot encode arguments: {}", e),
            }
        })?;

        Ok(vec![
            "transactions".to_string(),
            "send".to_string(),
            payload.template.display().to_string(),
            "--args-json".to_string(),
            args_json,
            "--network".to_string(),
            self.network.clone(),
            "--signer".to_string(),
            self.signer.clone(),
            "--output".to_string(),
            "json".to_string(),
        ])
    }
}

#[async_trait]
impl TransactionBackend for FlowCli {
    async fn submit(
        &self,
        payload: &TransactionPayload,
        account: &str,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        if !payload.template.exists() {
            return Err(SubmissionError::MalformedPayload {
                reason: format!("transaction file {} not found", payload.template.display()),
            });
        }

        debug!(
            "Sending {} items from {} as {} (expected sequence number {})",
            payload.item_count, account, self.signer, payload.sequence_number
        );

        let args = self.send_args(payload)?;
        let output = self.run(&args).await?;

        // A non-zero exit can still mean the transaction went out
        match parse_send_output(&output.stdout) {
            Ok(receipt) => {
                if !output.success {
                    warn!(
                        "flow CLI exited with {:?} but reported transaction {}",
                        output.code, receipt.handle
                    );
                }
                Ok(receipt)
            }
            Err(_) if !output.success => Err(FlowCliError::Failed {
                code: output.code,
                stderr: if output.stderr.is_empty() {
                    output.stdout.trim().to_string()
                } else {
                    output.stderr
                },
            }
            .into()),
            Err(e) => Err(e),
        }
    }
}

/// Parses `flow transactions send --output json`
pub fn parse_send_output(stdout: &str) -> Result<SubmissionReceipt, SubmissionError> {
    let json: Value =
        serde_json::from_str(stdout.trim()).map_err(|e| SubmissionError::Transport {
            reason: format!("unparsable flow CLI output: {}", e),
        })?;

    let id = ["id", "transactionId"]
        .iter()
        .filter_map(|key| json.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string);

    let error = json
        .get("error")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let Some(id) = id else {
        return Err(match error {
            Some(reason) => SubmissionError::Rejected { reason },
            None => SubmissionError::Transport {
                reason: "flow CLI output has no transaction id".to_string(),
            },
        });
    };

    let state = cli_state(&json, error.is_some());
    Ok(SubmissionReceipt::new(TxHandle::new(id))
        .with_state(state)
        .with_raw(json))
}

/// Numeric codes: 0 UNKNOWN, 1 PENDING, 2 FINALIZED, 3 EXECUTED, 4 SEALED, 5 EXPIRED
fn cli_state(json: &Value, has_error: bool) -> TransactionState {
    if has_error {
        return TransactionState::Rejected;
    }

    let name = match json.get("status") {
        Some(Value::Number(n)) => match n.as_u64() {
            Some(4) => "SEALED",
            Some(5) => "EXPIRED",
            _ => "",
        },
        Some(Value::String(s)) => s.as_str(),
        _ => "",
    };
    let name = if name.is_empty() {
        json.get("statusString").and_then(Value::as_str).unwrap_or("")
    } else {
        name
    };

    match name.to_ascii_uppercase().as_str() {
        "SEALED" => TransactionState::Finalized,
        "EXPIRED" => TransactionState::Rejected,
        _ => TransactionState::Pending,
    }
}
