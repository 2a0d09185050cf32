//! JSON checkpoint of a run, rewritten after every batch.

use crate::error::CheckpointError;
use crate::submission::SequenceNumber;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint<T> {
    /// Zero-based index of the batch whose items lead `pending`; a resumed
    /// run numbers its batches from here
    pub first_pending_batch: usize,
    pub last_confirmed_sequence: Option<SequenceNumber>,
    /// Items not yet finalized: failed batches plus everything not attempted
    pub pending: Vec<T>,
    pub updated_at: DateTime<Utc>,
}

impl<T> Checkpoint<T> {
    pub fn new(
        first_pending_batch: usize,
        last_confirmed_sequence: Option<SequenceNumber>,
        pending: Vec<T>,
    ) -> Self {
        Self {
            first_pending_batch,
            last_confirmed_sequence,
            pending,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads the checkpoint, `None` when there is none yet
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<Checkpoint<T>>, CheckpointError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        let checkpoint = serde_json::from_str(&content).map_err(|e| CheckpointError::Corrupt {
            path: self.display(),
            reason: e.to_string(),
        })?;
        Ok(Some(checkpoint))
    }

    /// Writes to a sibling temp file and renames it over the old checkpoint
    pub fn save<T: Serialize>(&self, checkpoint: &Checkpoint<T>) -> Result<(), CheckpointError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_string_pretty(checkpoint).map_err(|e| CheckpointError::Io {
            path: self.display(),
            msg: e.to_string(),
        })?;

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;

        debug!(
            "Checkpoint saved: pending from batch #{}, {} items",
            checkpoint.first_pending_batch + 1,
            checkpoint.pending.len()
        );
        Ok(())
    }

    pub fn clear(&self) -> Result<(), CheckpointError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn display(&self) -> String {
        self.path.display().to_string()
    }

    fn io_error(&self, e: std::io::Error) -> CheckpointError {
        CheckpointError::Io {
            path: self.display(),
            msg: e.to_string(),
        }
    }
}
