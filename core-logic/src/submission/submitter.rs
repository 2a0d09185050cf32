use crate::error::SubmissionError;
use crate::submission::{Batch, SequenceNumber, SubmissionReceipt};
use crate::traits::{PayloadBuilder, TransactionBackend};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Builds one transaction per batch and hands it to the backend
///
/// There is deliberately no retry in here. Resubmitting after an ambiguous
/// network error can double-submit a payload, so that decision belongs to
/// the orchestrator where it is logged.
pub struct TransactionSubmitter<T> {
    backend: Arc<dyn TransactionBackend>,
    builder: Box<dyn PayloadBuilder<T>>,
    account: String,
}

impl<T> TransactionSubmitter<T> {
    pub fn new(
        backend: Arc<dyn TransactionBackend>,
        builder: Box<dyn PayloadBuilder<T>>,
        account: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            builder,
            account: account.into(),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Submits `batch` using `sequence_number`; exactly one backend call
    pub async fn submit(
        &self,
        batch: &Batch<T>,
        sequence_number: SequenceNumber,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let payload = self.builder.build(batch, sequence_number)?;
        if payload.sequence_number != sequence_number {
            return Err(SubmissionError::MalformedPayload {
                reason: format!(
                    "payload carries sequence number {} instead of {}",
                    payload.sequence_number, sequence_number
                ),
            });
        }

        let start = Instant::now();
        let receipt = self.backend.submit(&payload, &self.account).await?;
        debug!(
            "Batch #{} accepted as {} in {:?} (immediate state: {:?})",
            batch.number(),
            receipt.handle,
            start.elapsed(),
            receipt.immediate_state
        );

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::{TransactionPayload, TxHandle};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBackend {
        calls: Mutex<Vec<TransactionPayload>>,
        fail_with: Option<SubmissionError>,
    }

    #[async_trait]
    impl TransactionBackend for RecordingBackend {
        async fn submit(
            &self,
            payload: &TransactionPayload,
            _account: &str,
        ) -> Result<SubmissionReceipt, SubmissionError> {
            self.calls.lock().unwrap().push(payload.clone());
            match &self.fail_with {
                Some(e) => Err(e.clone()),
                None => Ok(SubmissionReceipt::new(TxHandle::new("tx-1"))),
            }
        }
    }

    struct IdsBuilder;

    impl PayloadBuilder<u64> for IdsBuilder {
        fn build(
            &self,
            batch: &Batch<u64>,
            sequence_number: SequenceNumber,
        ) -> Result<TransactionPayload, SubmissionError> {
            Ok(TransactionPayload {
                template: PathBuf::from("tx.cdc"),
                arguments: vec![serde_json::json!(batch.items())],
                sequence_number,
                item_count: batch.len(),
            })
        }
    }

    #[tokio::test]
    async fn test_submit_makes_one_call_with_sequence() {
        let backend = Arc::new(RecordingBackend::default());
        let submitter = TransactionSubmitter::new(backend.clone(), Box::new(IdsBuilder), "0xabc");

        let batch = Batch::new(0, vec![1u64, 2, 3]);
        let receipt = submitter.submit(&batch, 12).await.unwrap();
        assert_eq!(receipt.handle.as_str(), "tx-1");

        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].sequence_number, 12);
        assert_eq!(calls[0].item_count, 3);
    }

    #[tokio::test]
    async fn test_submit_does_not_retry() {
        let backend = Arc::new(RecordingBackend {
            fail_with: Some(SubmissionError::Transport {
                reason: "connection reset by peer".to_string(),
            }),
            ..Default::default()
        });
        let submitter = TransactionSubmitter::new(backend.clone(), Box::new(IdsBuilder), "0xabc");

        let batch = Batch::new(0, vec![1u64]);
        assert!(submitter.submit(&batch, 1).await.is_err());
        assert_eq!(backend.calls.lock().unwrap().len(), 1);
    }
}
