//! Durable run-progress checkpoints.
//!
//! A checkpoint is the single recovery boundary: it records the last phase
//! fully completed for a run plus the item ids still pending inside the
//! current phase. The orchestrator writes one after every phase and every
//! `checkpoint.interval_items` completions within a phase, so a crash loses
//! at most one interval's worth of work.
//!
//! Writes go to a temp file in the same directory and are renamed into
//! place, so a reader (or a resume after a crash mid-write) never observes a
//! torn checkpoint. The store is a trait so the persistence mechanism stays
//! swappable without touching orchestration logic.

use crate::types::Phase;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Version of the checkpoint format. Bump to invalidate old checkpoints
/// when the layout or resume semantics change.
const CHECKPOINT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable snapshot of run progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub run_id: String,
    /// Fingerprint of the config the run started with. A resume under a
    /// different fingerprint is refused rather than silently mixed.
    pub config_fingerprint: String,
    /// Last phase fully completed, `None` before Extract finishes.
    pub phase_cursor: Option<Phase>,
    /// Item ids not yet terminal within the phase currently executing.
    pub pending: Vec<u32>,
    /// Epoch seconds of the last save.
    pub updated_at: u64,
}

impl Checkpoint {
    pub fn new(run_id: impl Into<String>, config_fingerprint: impl Into<String>) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            run_id: run_id.into(),
            config_fingerprint: config_fingerprint.into(),
            phase_cursor: None,
            pending: Vec::new(),
            updated_at: epoch_seconds(),
        }
    }

    /// The phase a resume should execute next.
    pub fn resume_phase(&self) -> Option<Phase> {
        match self.phase_cursor {
            None => Some(Phase::Extract),
            Some(done) => done.next(),
        }
    }
}

fn epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Persistence contract for checkpoints.
pub trait CheckpointStore: Sync {
    /// Persist atomically; a concurrent reader never sees a partial write.
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;

    /// Load the checkpoint for a run, or `None` when absent or unreadable
    /// from an older format version.
    fn load(&self, run_id: &str) -> Result<Option<Checkpoint>, CheckpointError>;

    /// Remove any resumable state. Called only after Package completes.
    fn clear(&self, run_id: &str) -> Result<(), CheckpointError>;
}

/// File-per-run JSON checkpoint store.
pub struct JsonCheckpointStore {
    dir: PathBuf,
}

impl JsonCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, run_id: &str) -> PathBuf {
        self.dir.join(format!("{run_id}.checkpoint.json"))
    }
}

impl CheckpointStore for JsonCheckpointStore {
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        fs::create_dir_all(&self.dir)?;
        let mut stamped = checkpoint.clone();
        stamped.updated_at = epoch_seconds();
        let json = serde_json::to_string_pretty(&stamped)?;

        // Write-to-temp-then-rename keeps the visible file whole.
        let final_path = self.path_for(&checkpoint.run_id);
        let tmp_path = self.dir.join(format!("{}.checkpoint.tmp", checkpoint.run_id));
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }

    fn load(&self, run_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        let path = self.path_for(run_id);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let checkpoint: Checkpoint = match serde_json::from_str(&content) {
            Ok(c) => c,
            // A torn or foreign file is worth no more than no checkpoint.
            Err(_) => return Ok(None),
        };
        if checkpoint.version != CHECKPOINT_VERSION {
            return Ok(None);
        }
        Ok(Some(checkpoint))
    }

    fn clear(&self, run_id: &str) -> Result<(), CheckpointError> {
        let path = self.path_for(run_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Resolve the checkpoint directory under a work dir.
pub fn checkpoint_dir(work_dir: &Path) -> PathBuf {
    work_dir.join("checkpoints")
}
