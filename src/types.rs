//! Shared types used across all pipeline phases.
//!
//! These types are serialized to JSON in the catalog, checkpoint, and report
//! files and must stay stable across resumes of the same run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The six processing phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    Extract,
    Rename,
    Analyze,
    Filter,
    Convert,
    Package,
}

impl Phase {
    /// All phases in execution order.
    pub const ORDER: [Phase; 6] = [
        Phase::Extract,
        Phase::Rename,
        Phase::Analyze,
        Phase::Filter,
        Phase::Convert,
        Phase::Package,
    ];

    /// The phase following this one, or `None` after `Package`.
    pub fn next(self) -> Option<Phase> {
        let idx = Phase::ORDER.iter().position(|p| *p == self).unwrap_or(0);
        Phase::ORDER.get(idx + 1).copied()
    }

    /// The status an item holds once it has passed this phase.
    pub fn completed_status(self) -> ItemStatus {
        match self {
            Phase::Extract => ItemStatus::Extracted,
            Phase::Rename => ItemStatus::Renamed,
            Phase::Analyze => ItemStatus::Analyzed,
            Phase::Filter => ItemStatus::Accepted,
            Phase::Convert => ItemStatus::Converted,
            Phase::Package => ItemStatus::Packaged,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Extract => "extract",
            Phase::Rename => "rename",
            Phase::Analyze => "analyze",
            Phase::Filter => "filter",
            Phase::Convert => "convert",
            Phase::Package => "package",
        };
        f.write_str(name)
    }
}

/// Where an item stands in the pipeline.
///
/// Statuses advance only forward along the phase order. `Rejected` and
/// `Failed` are terminal; `Failed` is reachable from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus {
    Pending,
    Extracted,
    Renamed,
    Analyzed,
    Accepted,
    Rejected,
    Converted,
    Packaged,
    Failed,
}

impl ItemStatus {
    /// Position along the forward phase order. `Rejected` and `Failed`
    /// sit outside the order and are handled separately.
    pub fn rank(self) -> u8 {
        match self {
            ItemStatus::Pending => 0,
            ItemStatus::Extracted => 1,
            ItemStatus::Renamed => 2,
            ItemStatus::Analyzed => 3,
            ItemStatus::Accepted => 4,
            ItemStatus::Converted => 5,
            ItemStatus::Packaged => 6,
            ItemStatus::Rejected | ItemStatus::Failed => 7,
        }
    }

    /// Terminal statuses never change again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ItemStatus::Packaged | ItemStatus::Rejected | ItemStatus::Failed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Extracted => "extracted",
            ItemStatus::Renamed => "renamed",
            ItemStatus::Analyzed => "analyzed",
            ItemStatus::Accepted => "accepted",
            ItemStatus::Rejected => "rejected",
            ItemStatus::Converted => "converted",
            ItemStatus::Packaged => "packaged",
            ItemStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Image properties discovered during Analyze.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAttributes {
    pub width: u32,
    pub height: u32,
    /// Detected source format, lowercase (`"jpeg"`, `"png"`, ...).
    pub format: String,
    pub size_bytes: u64,
}

impl ImageAttributes {
    /// The smaller of width and height - the value Filter thresholds on.
    pub fn min_dimension(&self) -> u32 {
        self.width.min(self.height)
    }
}

/// One image tracked through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Sequential id assigned at registration, unique within the run.
    pub id: u32,
    /// Opaque locator back to the origin (file path, URL, archive member).
    pub source_ref: String,
    pub status: ItemStatus,
    /// Populated by Analyze; `None` before then.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<ImageAttributes>,
    /// Output name assigned by Rename (`img000042`-style).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_name: Option<String>,
    /// Spooled raw bytes in the work dir, set by Extract.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_path: Option<String>,
    /// Transcoded output in the work dir, set by Convert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converted_path: Option<String>,
    /// Only set when status is `Rejected` or `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<String>,
}

impl Item {
    pub fn new(id: u32, source_ref: impl Into<String>) -> Self {
        Self {
            id,
            source_ref: source_ref.into(),
            status: ItemStatus::Pending,
            attributes: None,
            assigned_name: None,
            raw_path: None,
            converted_path: None,
            reject_reason: None,
        }
    }

    /// Whether this item still has to go through `phase`.
    ///
    /// Terminal items (packaged, rejected, failed) are past everything.
    pub fn needs_phase(&self, phase: Phase) -> bool {
        !self.status.is_terminal() && self.status.rank() < phase.completed_status().rank()
    }
}

/// Per-phase statistics aggregated into the run result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseStats {
    pub processed: u32,
    pub succeeded: u32,
    pub rejected: u32,
    pub failed: u32,
    pub skipped: u32,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub elapsed_ms: u64,
}

/// A rejected or failed item surfaced in the final report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub id: u32,
    pub source_ref: String,
    pub status: ItemStatus,
    pub reason: String,
}

/// Final result of a run, consumed by the report writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    pub source: String,
    /// Per-phase statistics, in execution order. Phases skipped on
    /// resume appear with an all-zero entry.
    pub phases: Vec<(Phase, PhaseStats)>,
    /// Status name → item count at the end of the run.
    pub item_counts: BTreeMap<String, u32>,
    /// Rejected and failed items with their reasons.
    pub failures: Vec<ItemFailure>,
    pub elapsed_ms: u64,
    /// False when the run was cancelled before Package finished.
    pub completed: bool,
}

impl RunResult {
    pub fn count(&self, status: ItemStatus) -> u32 {
        self.item_counts.get(status.as_str()).copied().unwrap_or(0)
    }
}
