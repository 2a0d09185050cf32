//! Per-set jobs: default tiers and set locking
//!
//! Both send one transaction per set:
//!
//! ```text
//! add_or_update_default_tier(setID: UInt32, tierRawValue: UInt8)
//! lock_set(setID: UInt32)
//! ```
//!
//! Default tiers come from `{"<set_id>": "<tier>"}` or from the tiers API
//! list, where `"defaultTier": "None"` marks a set without one. Sets to lock
//! are given as inclusive ranges, e.g. `1-73,75-99,118`.

use super::tiers::{Tier, parse_id, parse_set_list, read_json_file};
use crate::cadence;
use core_logic::{
    Batch, ConfigError, CoreError, MetadataSource, PayloadBuilder, SequenceNumber,
    SubmissionError, TransactionPayload,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The tier every play of `set_id` falls back to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDefaultTier {
    pub set_id: u32,
    pub tier: Tier,
}

/// Parses either default tier shape, sorted by set id
pub fn parse_default_tiers(value: &Value) -> Result<Vec<SetDefaultTier>, ConfigError> {
    let mut defaults = Vec::new();

    match value {
        Value::Object(sets) => {
            for (set_key, tier) in sets {
                let set_id = parse_id("set_id", set_key)?;
                let tier = tier.as_str().ok_or_else(|| {
                    ConfigError::invalid("tier", format!("set {} has a non-string tier", set_id))
                })?;
                defaults.push(SetDefaultTier {
                    set_id,
                    tier: parse_default(tier, set_id)?,
                });
            }
        }
        Value::Array(_) => {
            for set in parse_set_list(value)? {
                match set.default_tier.as_deref().map(str::trim) {
                    None | Some("") => {}
                    Some(raw) if raw.eq_ignore_ascii_case("none") => {
                        debug!("Set {} has no default tier", set.set_id);
                    }
                    Some(raw) => defaults.push(SetDefaultTier {
                        set_id: set.set_id,
                        tier: parse_default(raw, set.set_id)?,
                    }),
                }
            }
        }
        _ => {
            return Err(ConfigError::invalid(
                "default_tiers",
                "expected an object of sets or a list of sets",
            ));
        }
    }

    defaults.sort_by_key(|d| d.set_id);
    if let Some(pair) = defaults.windows(2).find(|w| w[0].set_id == w[1].set_id) {
        return Err(ConfigError::invalid(
            "default_tiers",
            format!("set {} is listed twice", pair[0].set_id),
        ));
    }
    Ok(defaults)
}

fn parse_default(raw: &str, set_id: u32) -> Result<Tier, ConfigError> {
    raw.parse::<Tier>().map_err(|_| {
        ConfigError::invalid(
            "tier",
            format!("unknown default tier '{}' for set {}", raw, set_id),
        )
    })
}

pub fn load_default_tiers(path: &Path) -> Result<Vec<SetDefaultTier>, ConfigError> {
    parse_default_tiers(&read_json_file(path)?)
}

pub async fn fetch_default_tiers(
    source: &dyn MetadataSource,
    url: &str,
) -> Result<Vec<SetDefaultTier>, CoreError> {
    info!("Downloading default tiers from {}", url);
    let value = source.get_json(url).await?;
    Ok(parse_default_tiers(&value)?)
}

/// Expands `1-73,75-99,118` into sorted, distinct set ids
pub fn parse_set_ranges(spec: &str) -> Result<Vec<u32>, ConfigError> {
    let mut ids = Vec::new();

    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start = parse_id("sets", start)?;
                let end = parse_id("sets", end)?;
                if start > end {
                    return Err(ConfigError::invalid(
                        "sets",
                        format!("range {} runs backwards", part),
                    ));
                }
                ids.extend(start..=end);
            }
            None => ids.push(parse_id("sets", part)?),
        }
    }

    if ids.is_empty() {
        return Err(ConfigError::invalid("sets", "no set ids given"));
    }

    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

/// One batch per item, numbered in order
pub fn one_per_batch<T: Clone>(items: &[T]) -> Vec<Batch<T>> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| Batch::new(index, vec![item.clone()]))
        .collect()
}

fn single<T>(batch: &Batch<T>) -> Result<&T, SubmissionError> {
    match batch.items() {
        [item] => Ok(item),
        items => Err(SubmissionError::MalformedPayload {
            reason: format!(
                "batch #{} carries {} sets, expected exactly one",
                batch.number(),
                items.len()
            ),
        }),
    }
}

pub struct DefaultTierBuilder {
    template: PathBuf,
}

impl DefaultTierBuilder {
    pub fn new(template: impl Into<PathBuf>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

impl PayloadBuilder<SetDefaultTier> for DefaultTierBuilder {
    fn build(
        &self,
        batch: &Batch<SetDefaultTier>,
        sequence_number: SequenceNumber,
    ) -> Result<TransactionPayload, SubmissionError> {
        let default = single(batch)?;

        Ok(TransactionPayload {
            template: self.template.clone(),
            arguments: vec![
                cadence::uint32(default.set_id),
                cadence::uint8(default.tier.raw_value()),
            ],
            sequence_number,
            item_count: 1,
        })
    }
}

pub struct LockSetBuilder {
    template: PathBuf,
}

impl LockSetBuilder {
    pub fn new(template: impl Into<PathBuf>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

impl PayloadBuilder<u32> for LockSetBuilder {
    fn build(
        &self,
        batch: &Batch<u32>,
        sequence_number: SequenceNumber,
    ) -> Result<TransactionPayload, SubmissionError> {
        let set_id = single(batch)?;

        Ok(TransactionPayload {
            template: self.template.clone(),
            arguments: vec![cadence::uint32(*set_id)],
            sequence_number,
            item_count: 1,
        })
    }
}
