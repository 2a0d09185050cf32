//! Bulk exchange of TopShot NFTs held by a child account.
//!
//! Each batch becomes one `exchangeNFTForTSHOT_child` transaction with the
//! arguments `(child: Address, nftIDs: [UInt64])`.

use crate::cadence;
use crate::flow_cli::{FlowCli, FlowCliError};
use core_logic::{Batch, PayloadBuilder, SequenceNumber, SubmissionError, TransactionPayload};
use std::path::{Path, PathBuf};
use tracing::info;

pub struct ExchangeBuilder {
    template: PathBuf,
    child_address: String,
}

impl ExchangeBuilder {
    /// `child_address` must be normalized
    pub fn new(template: impl Into<PathBuf>, child_address: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            child_address: child_address.into(),
        }
    }
}

impl PayloadBuilder<u64> for ExchangeBuilder {
    fn build(
        &self,
        batch: &Batch<u64>,
        sequence_number: SequenceNumber,
    ) -> Result<TransactionPayload, SubmissionError> {
        if batch.is_empty() {
            return Err(SubmissionError::MalformedPayload {
                reason: format!("batch #{} has no NFT ids", batch.number()),
            });
        }

        let ids = batch.items().iter().map(|id| cadence::uint64(*id)).collect();

        Ok(TransactionPayload {
            template: self.template.clone(),
            arguments: vec![cadence::address(&self.child_address), cadence::array(ids)],
            sequence_number,
            item_count: batch.len(),
        })
    }
}

/// Lists the NFT ids held by `child_address`
pub async fn load_child_ids(
    cli: &FlowCli,
    ids_script: &Path,
    child_address: &str,
) -> Result<Vec<u64>, FlowCliError> {
    info!("Fetching NFT IDs for child account {}...", child_address);
    let ids = cli.collection_ids(ids_script, child_address).await?;
    info!("Found {} NFT IDs in child's collection", ids.len());
    Ok(ids)
}
