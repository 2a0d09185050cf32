//! Bulk tier assignment for plays in open sets
//!
//! Two mapping shapes are accepted: the file format
//! `{"<set_id>": {"<play_id>": "<tier>"}}` and the list served by the tiers
//! API, `[{"setID", "defaultTier", "playTiers": [{"playID", "tier"}]}]`.
//! Plays are grouped per `(set, tier)` and every group is split into
//! batches on its own, since one `add_bulk_playid_tier` transaction takes a
//! single set and a single tier:
//!
//! ```text
//! (setID: UInt32, playIDs: [UInt32], tierRawValue: UInt8)
//! ```
//!
//! Groups are ordered by set id, then tier, with play ids ascending, so
//! the same mapping always produces the same batches.

use crate::cadence;
use core_logic::{
    Batch, ConfigError, CoreError, MetadataSource, PayloadBuilder, SequenceNumber,
    SubmissionError, TransactionPayload, split,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Common,
    Fandom,
    Rare,
    Legendary,
    Ultimate,
}

impl Tier {
    /// Raw value of the on-chain tier enum
    pub fn raw_value(self) -> u8 {
        match self {
            Tier::Common => 0,
            Tier::Fandom => 1,
            Tier::Rare => 2,
            Tier::Legendary => 3,
            Tier::Ultimate => 4,
        }
    }
}

impl FromStr for Tier {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "common" => Ok(Tier::Common),
            "fandom" => Ok(Tier::Fandom),
            "rare" => Ok(Tier::Rare),
            "legendary" => Ok(Tier::Legendary),
            "ultimate" => Ok(Tier::Ultimate),
            other => Err(ConfigError::invalid("tier", format!("unknown tier '{}'", other))),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Common => "common",
            Tier::Fandom => "fandom",
            Tier::Rare => "rare",
            Tier::Legendary => "legendary",
            Tier::Ultimate => "ultimate",
        };
        f.write_str(name)
    }
}

/// One play that should carry `tier` within `set_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierAssignment {
    pub set_id: u32,
    pub play_id: u32,
    pub tier: Tier,
}

/// One set as listed by the tiers API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetTiers {
    #[serde(rename = "setID")]
    pub set_id: u32,
    /// `"None"` for open sets without a default
    #[serde(default)]
    pub default_tier: Option<String>,
    #[serde(default)]
    pub play_tiers: Vec<PlayTier>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayTier {
    #[serde(rename = "playID")]
    pub play_id: u32,
    pub tier: String,
}

/// Parses the tiers API list of sets
pub fn parse_set_list(value: &Value) -> Result<Vec<SetTiers>, ConfigError> {
    serde_json::from_value(value.clone())
        .map_err(|e| ConfigError::invalid("mapping", format!("bad set list: {}", e)))
}

/// Flattens either mapping shape into sorted assignments
pub fn parse_mapping(value: &Value) -> Result<Vec<TierAssignment>, ConfigError> {
    let mut assignments = match value {
        Value::Object(sets) => parse_set_object(sets)?,
        Value::Array(_) => {
            let mut assignments = Vec::new();
            for set in parse_set_list(value)? {
                for play in &set.play_tiers {
                    assignments.push(TierAssignment {
                        set_id: set.set_id,
                        play_id: play.play_id,
                        tier: parse_tier(&play.tier, play.play_id, set.set_id)?,
                    });
                }
            }
            assignments
        }
        _ => {
            return Err(ConfigError::invalid(
                "mapping",
                "expected an object of sets or a list of sets",
            ));
        }
    };

    assignments.sort_by_key(|a| (a.set_id, a.tier, a.play_id));
    Ok(assignments)
}

fn parse_set_object(sets: &Map<String, Value>) -> Result<Vec<TierAssignment>, ConfigError> {
    let mut assignments = Vec::new();
    for (set_key, plays) in sets {
        let set_id = parse_id("set_id", set_key)?;
        let plays = plays.as_object().ok_or_else(|| {
            ConfigError::invalid("mapping", format!("set {} must map play ids to tiers", set_id))
        })?;

        for (play_key, tier) in plays {
            let play_id = parse_id("play_id", play_key)?;
            let tier = tier.as_str().ok_or_else(|| {
                ConfigError::invalid(
                    "tier",
                    format!("play {} in set {} has a non-string tier", play_id, set_id),
                )
            })?;

            assignments.push(TierAssignment {
                set_id,
                play_id,
                tier: parse_tier(tier, play_id, set_id)?,
            });
        }
    }
    Ok(assignments)
}

fn parse_tier(raw: &str, play_id: u32, set_id: u32) -> Result<Tier, ConfigError> {
    raw.parse::<Tier>().map_err(|_| {
        ConfigError::invalid(
            "tier",
            format!("unknown tier '{}' for play {} in set {}", raw, play_id, set_id),
        )
    })
}

pub(crate) fn parse_id(field: &str, key: &str) -> Result<u32, ConfigError> {
    key.trim()
        .parse::<u32>()
        .map_err(|e| ConfigError::invalid(field, format!("'{}': {}", key, e)))
}

pub(crate) fn read_json_file(path: &Path) -> Result<Value, ConfigError> {
    let display = path.display().to_string();
    if !path.exists() {
        return Err(ConfigError::FileNotFound { path: display });
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: display.clone(),
        msg: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: display,
        reason: e.to_string(),
    })
}

pub fn load_mapping_file(path: &Path) -> Result<Vec<TierAssignment>, ConfigError> {
    parse_mapping(&read_json_file(path)?)
}

/// Downloads the mapping through a metadata source
pub async fn fetch_mapping(
    source: &dyn MetadataSource,
    url: &str,
) -> Result<Vec<TierAssignment>, CoreError> {
    info!("Downloading tier mapping from {}", url);
    let value = source.get_json(url).await?;
    Ok(parse_mapping(&value)?)
}

/// Splits each `(set, tier)` group into batches, numbered across the run
pub fn group_batches(
    assignments: &[TierAssignment],
    chunk_size: usize,
) -> Result<Vec<Batch<TierAssignment>>, ConfigError> {
    let mut groups: BTreeMap<(u32, Tier), Vec<TierAssignment>> = BTreeMap::new();
    for assignment in assignments {
        groups
            .entry((assignment.set_id, assignment.tier))
            .or_default()
            .push(*assignment);
    }

    let mut batches = Vec::new();
    for ((set_id, tier), mut members) in groups {
        members.sort_by_key(|a| a.play_id);
        let chunks = split(&members, chunk_size)?;
        info!(
            "Set {} / {}: {} plays in {} transactions",
            set_id,
            tier,
            members.len(),
            chunks.len()
        );

        for batch in chunks {
            batches.push(Batch::new(batches.len(), batch.into_items()));
        }
    }

    Ok(batches)
}

pub struct TierBuilder {
    template: PathBuf,
}

impl TierBuilder {
    pub fn new(template: impl Into<PathBuf>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

impl PayloadBuilder<TierAssignment> for TierBuilder {
    fn build(
        &self,
        batch: &Batch<TierAssignment>,
        sequence_number: SequenceNumber,
    ) -> Result<TransactionPayload, SubmissionError> {
        let first = batch.items().first().ok_or_else(|| SubmissionError::MalformedPayload {
            reason: format!("batch #{} has no plays", batch.number()),
        })?;

        if let Some(odd) = batch
            .items()
            .iter()
            .find(|a| a.set_id != first.set_id || a.tier != first.tier)
        {
            return Err(SubmissionError::MalformedPayload {
                reason: format!(
                    "batch #{} mixes set {}/{} with set {}/{}",
                    batch.number(),
                    first.set_id,
                    first.tier,
                    odd.set_id,
                    odd.tier
                ),
            });
        }

        let play_ids = batch
            .items()
            .iter()
            .map(|a| cadence::uint32(a.play_id))
            .collect();

        Ok(TransactionPayload {
            template: self.template.clone(),
            arguments: vec![
                cadence::uint32(first.set_id),
                cadence::array(play_ids),
                cadence::uint8(first.tier.raw_value()),
            ],
            sequence_number,
            item_count: batch.len(),
        })
    }
}
