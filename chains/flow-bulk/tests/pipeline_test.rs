use async_trait::async_trait;
use core_logic::{
    CheckpointStore, FailurePolicy, MetadataSource, NetworkError, SequenceNumber, StopReason,
    SubmissionConfig, SubmissionError, SubmissionOrchestrator, SubmissionReceipt,
    TransactionBackend, TransactionPayload,
};
use flow_bulk::AccessApiLedger;
use flow_bulk::flow_cli::parse_send_output;
use flow_bulk::jobs::exchange::ExchangeBuilder;
use flow_bulk::jobs::sets::{LockSetBuilder, one_per_batch, parse_set_ranges};
use flow_bulk::jobs::tiers::{TierAssignment, TierBuilder, group_batches, parse_mapping};
use flow_bulk::jobs::{finish, resume_items};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

const ACCOUNT: &str = "0xf8d6e0586b0a20c7";

#[derive(Debug, Clone, Copy)]
enum Outcome {
    /// CLI returns while pending, the access node later reports it sealed
    Seal,
    /// CLI reports a sealed transaction with an execution error
    Revert,
}

#[derive(Default)]
struct NodeState {
    sequence: SequenceNumber,
    results: HashMap<String, Value>,
    script: VecDeque<Outcome>,
    sent: Vec<(SequenceNumber, Vec<Value>)>,
    account_lookups: usize,
    /// Another signer on the same proposal key, one transaction per send
    foreign_per_submit: SequenceNumber,
}

/// Flow CLI and access node sharing one in-memory chain
#[derive(Clone, Default)]
struct FakeFlow {
    state: Arc<Mutex<NodeState>>,
}

impl FakeFlow {
    fn new(sequence: SequenceNumber, script: Vec<Outcome>) -> Self {
        let flow = Self::default();
        {
            let mut state = flow.state.lock().unwrap();
            state.sequence = sequence;
            state.script = script.into();
        }
        flow
    }

    fn sent(&self) -> Vec<(SequenceNumber, Vec<Value>)> {
        self.state.lock().unwrap().sent.clone()
    }

    fn account_lookups(&self) -> usize {
        self.state.lock().unwrap().account_lookups
    }

    fn ledger(&self) -> Arc<AccessApiLedger> {
        Arc::new(
            AccessApiLedger::new(Arc::new(self.clone()), "http://access.test", 0).unwrap(),
        )
    }
}

#[async_trait]
impl TransactionBackend for FakeFlow {
    async fn submit(
        &self,
        payload: &TransactionPayload,
        _account: &str,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let stdout = {
            let mut state = self.state.lock().unwrap();
            let outcome = state.script.pop_front().unwrap_or(Outcome::Seal);
            let id = format!("{:064x}", state.sent.len() + 1);
            state
                .sent
                .push((payload.sequence_number, payload.arguments.clone()));
            // Flow consumes the proposal key sequence number for reverted transactions too
            state.sequence += 1 + state.foreign_per_submit;

            match outcome {
                Outcome::Seal => {
                    state.results.insert(
                        id.clone(),
                        json!({"status": "Sealed", "error_message": "", "execution": "Success"}),
                    );
                    json!({"id": id, "status": 1, "statusString": "PENDING"})
                }
                Outcome::Revert => json!({
                    "id": id,
                    "status": 4,
                    "statusString": "SEALED",
                    "error": "[Error Code: 1101] pre-condition failed: NFT is locked"
                }),
            }
        };

        parse_send_output(&stdout.to_string())
    }
}

#[async_trait]
impl MetadataSource for FakeFlow {
    async fn get_json(&self, url: &str) -> Result<Value, NetworkError> {
        let mut state = self.state.lock().unwrap();

        if url.contains("/v1/accounts/") {
            state.account_lookups += 1;
            return Ok(json!({
                "address": ACCOUNT.trim_start_matches("0x"),
                "keys": [{"index": "0", "sequence_number": state.sequence.to_string(), "revoked": false}]
            }));
        }

        let id = url.rsplit('/').next().unwrap_or_default();
        state.results.get(id).cloned().ok_or(NetworkError::HttpError {
            status_code: 404,
            endpoint: url.to_string(),
            body: "transaction result not found".to_string(),
        })
    }
}

fn fast_config(chunk_size: usize, failure_policy: FailurePolicy) -> SubmissionConfig {
    SubmissionConfig {
        chunk_size,
        poll_interval_ms: 1,
        max_poll_attempts: 5,
        failure_policy,
        fetch_retries: 0,
        ..Default::default()
    }
}

fn array_len(argument: &Value) -> usize {
    argument["value"].as_array().map(Vec::len).unwrap_or(0)
}

#[tokio::test]
async fn test_tier_mapping_runs_one_sequence_chain() {
    let mapping = json!({
        "26": {"1401": "legendary", "1402": "legendary", "1403": "legendary", "1500": "common"},
        "3": {"7": "rare"}
    });
    let assignments = parse_mapping(&mapping).unwrap();
    let batches = group_batches(&assignments, 2).unwrap();

    let flow = FakeFlow::new(40, vec![]);
    let mut orchestrator = SubmissionOrchestrator::new(
        fast_config(2, FailurePolicy::Halt),
        ACCOUNT,
        Arc::new(flow.clone()),
        flow.ledger(),
        Box::new(TierBuilder::new("tiers.cdc")),
    );

    let summary = orchestrator.run_batches(batches).await.unwrap();
    assert!(summary.is_complete());
    assert_eq!(summary.successes(), 4);
    assert_eq!(summary.last_confirmed, Some(43));
    assert!(finish(&summary).is_ok());

    let sent = flow.sent();
    let sequences: Vec<SequenceNumber> = sent.iter().map(|(seq, _)| *seq).collect();
    assert_eq!(sequences, vec![40, 41, 42, 43]);

    // set 3 first, then set 26 common before legendary
    let groups: Vec<(String, String, usize)> = sent
        .iter()
        .map(|(_, args)| {
            (
                args[0]["value"].as_str().unwrap().to_string(),
                args[2]["value"].as_str().unwrap().to_string(),
                array_len(&args[1]),
            )
        })
        .collect();
    assert_eq!(
        groups,
        vec![
            ("3".to_string(), "2".to_string(), 1),
            ("26".to_string(), "0".to_string(), 1),
            ("26".to_string(), "3".to_string(), 2),
            ("26".to_string(), "3".to_string(), 1),
        ]
    );

    assert_eq!(flow.account_lookups(), 1);
}

#[tokio::test]
async fn test_reverted_exchange_resyncs_from_access_node() {
    let flow = FakeFlow::new(7, vec![Outcome::Seal, Outcome::Revert, Outcome::Seal]);
    let ids: Vec<u64> = (1..=6).collect();

    let mut orchestrator = SubmissionOrchestrator::new(
        fast_config(2, FailurePolicy::ResyncAndContinue),
        ACCOUNT,
        Arc::new(flow.clone()),
        flow.ledger(),
        Box::new(ExchangeBuilder::new("exchange.cdc", "0x4ab8b294112f182c")),
    );

    let summary = orchestrator.run(&ids).await.unwrap();
    assert_eq!(summary.stop_reason, StopReason::Exhausted);
    assert_eq!(summary.successes(), 2);
    assert_eq!(summary.failures(), 1);
    assert_eq!(summary.unsubmitted, vec![3, 4]);
    assert!(finish(&summary).is_err());

    let sequences: Vec<SequenceNumber> = flow.sent().iter().map(|(seq, _)| *seq).collect();
    assert_eq!(sequences, vec![7, 8, 9]);

    // initial lookup plus the resync after the revert
    assert_eq!(flow.account_lookups(), 2);
}

#[tokio::test]
async fn test_halted_run_resumes_from_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("exchange-0x4ab8b294112f182c.json");
    let ids: Vec<u64> = (100..105).collect();

    let flow = FakeFlow::new(0, vec![Outcome::Seal, Outcome::Revert]);
    let mut orchestrator = SubmissionOrchestrator::new(
        fast_config(2, FailurePolicy::Halt),
        ACCOUNT,
        Arc::new(flow.clone()),
        flow.ledger(),
        Box::new(ExchangeBuilder::new("exchange.cdc", "0x4ab8b294112f182c")),
    )
    .with_checkpoint(CheckpointStore::new(&path));

    let summary = orchestrator.run(&ids).await.unwrap();
    assert_eq!(summary.stop_reason, StopReason::Halted);
    assert_eq!(summary.unsubmitted, vec![102, 103, 104]);

    let store = CheckpointStore::new(&path);
    assert!(resume_items::<u64>(&store, false).unwrap().is_none());
    let checkpoint = resume_items::<u64>(&store, true).unwrap().unwrap();
    assert_eq!(checkpoint.pending, vec![102, 103, 104]);
    assert_eq!(checkpoint.first_pending_batch, 1);
    let pending = checkpoint.pending;

    let mut orchestrator = SubmissionOrchestrator::new(
        fast_config(2, FailurePolicy::Halt),
        ACCOUNT,
        Arc::new(flow.clone()),
        flow.ledger(),
        Box::new(ExchangeBuilder::new("exchange.cdc", "0x4ab8b294112f182c")),
    )
    .with_checkpoint(CheckpointStore::new(&path))
    .with_batch_offset(checkpoint.first_pending_batch);

    let summary = orchestrator.run(&pending).await.unwrap();
    assert!(summary.is_complete());
    let numbers: Vec<usize> = summary.records.iter().map(|r| r.number).collect();
    assert_eq!(numbers, vec![2, 3]);
    assert!(!store.exists());

    let sent = flow.sent();
    let sequences: Vec<SequenceNumber> = sent.iter().map(|(seq, _)| *seq).collect();
    assert_eq!(sequences, vec![0, 1, 2, 3]);
    assert_eq!(array_len(&sent[2].1[1]), 2);
    assert_eq!(array_len(&sent[3].1[1]), 1);
}

#[tokio::test]
async fn test_resume_without_checkpoint_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("tiers.json"));
    assert!(resume_items::<TierAssignment>(&store, true).unwrap().is_none());
}

#[tokio::test]
async fn test_lock_sets_follow_access_node_on_drift() {
    let flow = FakeFlow::new(20, vec![]);
    flow.state.lock().unwrap().foreign_per_submit = 1;

    let set_ids = parse_set_ranges("75-76,118").unwrap();
    let mut config = fast_config(40, FailurePolicy::Halt);
    config.verify_sequence = true;

    let mut orchestrator = SubmissionOrchestrator::new(
        config,
        ACCOUNT,
        Arc::new(flow.clone()),
        flow.ledger(),
        Box::new(LockSetBuilder::new("lock_set.cdc")),
    );

    let summary = orchestrator
        .run_batches(one_per_batch(&set_ids))
        .await
        .unwrap();
    assert!(summary.is_complete());

    let sent = flow.sent();
    let sequences: Vec<SequenceNumber> = sent.iter().map(|(seq, _)| *seq).collect();
    assert_eq!(sequences, vec![20, 22, 24]);

    let sets: Vec<&str> = sent
        .iter()
        .map(|(_, args)| args[0]["value"].as_str().unwrap())
        .collect();
    assert_eq!(sets, vec!["75", "76", "118"]);

    // initial lookup plus one check before each follow-up set
    assert_eq!(flow.account_lookups(), 3);
}
