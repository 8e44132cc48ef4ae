//! Data model shared between discovery, the orchestrator and the CLI.
//!
//! A [`WorkItem`] is created by discovery and moves from
//! [`ItemStatus::Pending`] to exactly one terminal status during the run.
//! Every processed item leaves an [`ItemOutcome`] behind, and the outcomes
//! plus counters form the [`RunSummary`].

use crate::error::ItemError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Status of a single candidate document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Needs converting in this run.
    Pending,
    /// Its target file already exists.
    AlreadyConverted,
    /// It lives inside an archive slot.
    AlreadyArchived,
    /// Converted in this run.
    Converted,
    /// Conversion failed in this run.
    Failed,
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ItemStatus::Pending => "pending",
            ItemStatus::AlreadyConverted => "already converted",
            ItemStatus::AlreadyArchived => "already archived",
            ItemStatus::Converted => "converted",
            ItemStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One candidate document tracked through one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Absolute path of the source document (file or bundle directory).
    pub source: PathBuf,
    /// Source path with the target suffix; may already exist.
    pub target: PathBuf,
    pub status: ItemStatus,
}

/// Result of processing one pending [`WorkItem`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub source: PathBuf,
    pub target: PathBuf,
    /// `Converted` or `Failed`.
    pub status: ItemStatus,
    /// Where the original was moved to, if archival succeeded.
    pub archived_to: Option<PathBuf>,
    /// Conversion error, or archive error on an otherwise converted item.
    pub error: Option<ItemError>,
    /// Wall-clock time spent on this item, in milliseconds.
    pub duration_ms: u64,
}

/// Everything discovery found under a root, classified.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchPlan {
    pub root: PathBuf,
    /// Items still to convert, in discovery order.
    pub pending: Vec<WorkItem>,
    pub already_converted: usize,
    pub already_archived: usize,
}

impl BatchPlan {
    /// Total candidates found, including the ones skipped.
    pub fn total_found(&self) -> usize {
        self.pending.len() + self.already_processed()
    }

    pub fn already_processed(&self) -> usize {
        self.already_converted + self.already_archived
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Summary of a batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub root: PathBuf,
    /// Items processed in this run (`converted + failed`).
    pub processed: usize,
    pub converted: usize,
    pub failed: usize,
    /// Converted items whose original could not be archived.
    pub archive_failures: usize,
    /// Candidates skipped because their target already existed.
    pub already_converted: usize,
    /// Candidates skipped because they live in an archive slot.
    pub already_archived: usize,
    /// Mid-batch restarts (the initial launch is not counted).
    pub restarts: usize,
    /// The batch stopped early on a cancellation request.
    pub interrupted: bool,
    pub elapsed_ms: u64,
    /// One entry per processed item, in processing order.
    pub outcomes: Vec<ItemOutcome>,
}

impl RunSummary {
    /// Outcomes that need manual attention: failed conversions and
    /// converted documents whose original could not be moved.
    pub fn problems(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| o.error.is_some())
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.archive_failures == 0
    }
}
