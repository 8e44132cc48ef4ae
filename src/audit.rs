//! Durable per-document audit log.
//!
//! One JSON object per line, appended and flushed as soon as each document
//! finishes, so the log survives a crash or an interrupted run and can be
//! grepped afterwards for every source path that needs manual attention.
//!
//! ```text
//! {"timestamp":"…","event":"start","root":"/Users/me/Docs","pending":3,…}
//! {"timestamp":"…","event":"item","source":"/Users/me/Docs/a.pages","status":"converted",…}
//! {"timestamp":"…","event":"summary","processed":3,"converted":3,"failed":0,…}
//! ```

use crate::error::BatchError;
use crate::output::{BatchPlan, ItemOutcome, RunSummary};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum AuditEvent<'a> {
    Start {
        root: &'a Path,
        pending: usize,
        already_converted: usize,
        already_archived: usize,
    },
    Item(&'a ItemOutcome),
    Summary {
        processed: usize,
        converted: usize,
        failed: usize,
        archive_failures: usize,
        restarts: usize,
        interrupted: bool,
        elapsed_ms: u64,
    },
}

#[derive(Serialize)]
struct AuditRecord<'a> {
    timestamp: DateTime<Local>,
    #[serde(flatten)]
    event: AuditEvent<'a>,
}

/// Append-only JSON-lines log of a batch run.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    file: File,
}

impl AuditLog {
    /// Open `path` for appending, creating parent directories as needed.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, BatchError> {
        let path = path.into();
        let io_err = |source| BatchError::AuditLog {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;
        Ok(Self { path, file })
    }

    /// `pages2docx_YYYYmmdd_HHMMSS.log` for the given moment.
    pub fn default_file_name(now: DateTime<Local>) -> String {
        format!("pages2docx_{}.log", now.format("%Y%m%d_%H%M%S"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_start(&mut self, plan: &BatchPlan) -> Result<(), BatchError> {
        self.write(AuditEvent::Start {
            root: &plan.root,
            pending: plan.pending.len(),
            already_converted: plan.already_converted,
            already_archived: plan.already_archived,
        })
    }

    pub fn record_item(&mut self, outcome: &ItemOutcome) -> Result<(), BatchError> {
        self.write(AuditEvent::Item(outcome))
    }

    pub fn record_summary(&mut self, summary: &RunSummary) -> Result<(), BatchError> {
        self.write(AuditEvent::Summary {
            processed: summary.processed,
            converted: summary.converted,
            failed: summary.failed,
            archive_failures: summary.archive_failures,
            restarts: summary.restarts,
            interrupted: summary.interrupted,
            elapsed_ms: summary.elapsed_ms,
        })
    }

    fn write(&mut self, event: AuditEvent<'_>) -> Result<(), BatchError> {
        let record = AuditRecord {
            timestamp: Local::now(),
            event,
        };
        let mut line = serde_json::to_string(&record)
            .map_err(|e| BatchError::Internal(format!("audit record: {e}")))?;
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.flush())
            .map_err(|source| BatchError::AuditLog {
                path: self.path.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ItemError;
    use crate::output::ItemStatus;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn lines(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn default_file_name_uses_timestamp() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            AuditLog::default_file_name(now),
            "pages2docx_20240309_140507.log"
        );
    }

    #[test]
    fn records_are_json_lines() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("logs/run.log");
        let mut log = AuditLog::create(&path).unwrap();

        log.record_start(&BatchPlan {
            root: PathBuf::from("/docs"),
            already_converted: 2,
            ..Default::default()
        })
        .unwrap();
        log.record_item(&ItemOutcome {
            source: PathBuf::from("/docs/a.pages"),
            target: PathBuf::from("/docs/a.docx"),
            status: ItemStatus::Failed,
            archived_to: None,
            error: Some(ItemError::Timeout { secs: 300 }),
            duration_ms: 12,
        })
        .unwrap();
        log.record_summary(&RunSummary {
            processed: 1,
            failed: 1,
            ..Default::default()
        })
        .unwrap();

        let records = lines(&path);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["event"], "start");
        assert_eq!(records[0]["already_converted"], 2);
        assert_eq!(records[1]["event"], "item");
        assert_eq!(records[1]["source"], "/docs/a.pages");
        assert_eq!(records[1]["status"], "failed");
        assert_eq!(records[1]["error"]["kind"], "timeout");
        assert_eq!(records[2]["event"], "summary");
        assert_eq!(records[2]["failed"], 1);
        assert!(records.iter().all(|r| r["timestamp"].is_string()));
    }

    #[test]
    fn create_appends_to_existing_log() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("run.log");
        AuditLog::create(&path)
            .unwrap()
            .record_summary(&RunSummary::default())
            .unwrap();
        AuditLog::create(&path)
            .unwrap()
            .record_summary(&RunSummary::default())
            .unwrap();
        assert_eq!(lines(&path).len(), 2);
    }
}
