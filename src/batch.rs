//! Batch orchestration: the single control loop of a conversion run.
//!
//! Every other module is either a pure function or a narrow side-effecting
//! call; all sequencing lives in [`BatchRunner`]:
//!
//! ```text
//! discover ──▶ confirm ──▶ ensure_running
//!                              │
//!              ┌───────────────┘
//!              ▼
//!          for each pending document:
//!              convert ──▶ archive (on success)
//!              count, audit, report
//!              restart every N documents
//!              │
//!              ▼
//!          stop ──▶ RunSummary
//! ```
//!
//! No error inside the loop aborts the batch. Only a missing root directory
//! and a declined confirmation end the run early, and both happen before
//! the application is launched or any file is moved.

use crate::audit::AuditLog;
use crate::config::BatchConfig;
use crate::error::BatchError;
use crate::output::{BatchPlan, ItemOutcome, ItemStatus, RunSummary, WorkItem};
use crate::pipeline::archive;
use crate::pipeline::bridge::CommandBridge;
use crate::pipeline::discover;
use crate::pipeline::lifecycle::{AppLifecycle, PagesLifecycle};
use crate::pipeline::oracle::{ConversionOracle, PagesOracle};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Counters owned by the loop.
///
/// `processed == converted + failed` holds after every document.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct RunState {
    processed: usize,
    converted: usize,
    failed: usize,
    archive_failures: usize,
    items_since_restart: usize,
    restarts: usize,
}

impl RunState {
    fn record(&mut self, outcome: &ItemOutcome) {
        match &outcome.error {
            Some(e) if e.is_conversion_failure() => self.failed += 1,
            Some(_) => {
                self.converted += 1;
                self.archive_failures += 1;
            }
            None => self.converted += 1,
        }
        self.processed += 1;
        self.items_since_restart += 1;
        debug_assert_eq!(self.processed, self.converted + self.failed);
    }
}

/// Drives one batch over a conversion oracle and an application lifecycle.
///
/// Generic over both collaborators so tests (and other platforms) can
/// substitute their own; [`run_batch`] wires up the Pages implementations.
pub struct BatchRunner<O, L> {
    oracle: O,
    lifecycle: L,
    config: BatchConfig,
    audit: Option<AuditLog>,
}

impl<O: ConversionOracle, L: AppLifecycle> BatchRunner<O, L> {
    pub fn new(oracle: O, lifecycle: L, config: BatchConfig) -> Self {
        Self {
            oracle,
            lifecycle,
            config,
            audit: None,
        }
    }

    /// Append every per-document outcome to `log`.
    pub fn with_audit_log(mut self, log: AuditLog) -> Self {
        self.audit = Some(log);
        self
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn lifecycle(&self) -> &L {
        &self.lifecycle
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Discover, confirm and convert everything pending under `root`.
    ///
    /// `confirm` sees the plan and must return `true` before anything is
    /// launched or moved. It is not called when there is nothing to do.
    ///
    /// # Errors
    /// Only fatal errors: [`BatchError::DirectoryNotFound`] /
    /// [`BatchError::NotADirectory`] for a bad root and
    /// [`BatchError::Declined`] when `confirm` returns `false`.
    /// Per-document failures are reported in the returned summary.
    pub async fn run<F>(&mut self, root: impl AsRef<Path>, confirm: F) -> Result<RunSummary, BatchError>
    where
        F: FnOnce(&BatchPlan) -> bool,
    {
        let started = Instant::now();
        info!("Starting conversion in {}", root.as_ref().display());

        // ── Step 1: Discover ─────────────────────────────────────────────
        let plan = discover::plan(root, &self.config)?;
        if plan.is_empty() {
            info!("No new files to convert");
            return Ok(RunSummary {
                root: plan.root.clone(),
                already_converted: plan.already_converted,
                already_archived: plan.already_archived,
                elapsed_ms: started.elapsed().as_millis() as u64,
                ..Default::default()
            });
        }

        // ── Step 2: Confirm ──────────────────────────────────────────────
        if !confirm(&plan) {
            info!("Cancelled by user");
            return Err(BatchError::Declined);
        }

        Ok(self.execute(plan, started).await)
    }

    /// Convert a confirmed plan. Steps 3–6 of a run.
    pub async fn execute(&mut self, plan: BatchPlan, started: Instant) -> RunSummary {
        let cb = self.config.progress_callback.clone();
        let total = plan.pending.len();
        let mut summary = RunSummary {
            root: plan.root.clone(),
            already_converted: plan.already_converted,
            already_archived: plan.already_archived,
            ..Default::default()
        };

        if let Some(log) = self.audit.as_mut() {
            if let Err(e) = log.record_start(&plan) {
                warn!("{e}");
            }
        }
        if let Some(ref cb) = cb {
            cb.on_batch_start(total);
        }

        // ── Step 3: Launch ───────────────────────────────────────────────
        if let Err(e) = self.lifecycle.ensure_running().await {
            warn!("{e}; continuing anyway");
        }

        // ── Step 4: Convert ──────────────────────────────────────────────
        let mut state = RunState::default();
        for (i, item) in plan.pending.into_iter().enumerate() {
            let index = i + 1;
            if self.config.cancel.is_cancelled() {
                warn!("Interrupted before document {index}/{total}");
                summary.interrupted = true;
                break;
            }

            if let Some(ref cb) = cb {
                cb.on_item_start(index, total, &item.source);
            }

            let outcome = self.process(item).await;
            state.record(&outcome);

            if let Some(ref cb) = cb {
                match (&outcome.status, &outcome.error) {
                    (ItemStatus::Converted, _) => cb.on_item_converted(
                        index,
                        total,
                        &outcome.source,
                        outcome.archived_to.as_deref(),
                    ),
                    (_, Some(e)) => cb.on_item_failed(index, total, &outcome.source, &e.to_string()),
                    (_, None) => cb.on_item_failed(index, total, &outcome.source, "unknown error"),
                }
            }
            if let Some(log) = self.audit.as_mut() {
                if let Err(e) = log.record_item(&outcome) {
                    warn!("{e}");
                }
            }
            let last_failed = outcome.status == ItemStatus::Failed;
            summary.outcomes.push(outcome);

            // Nothing left to protect once the last document is done.
            let more = index < total && !self.config.cancel.is_cancelled();
            if !more {
                continue;
            }

            if self
                .config
                .restart_policy
                .should_restart(state.items_since_restart, last_failed)
            {
                if let Some(ref cb) = cb {
                    cb.on_restart(state.processed);
                }
                if let Err(e) = self.lifecycle.restart().await {
                    warn!("{e}; continuing anyway");
                }
                state.items_since_restart = 0;
                state.restarts += 1;
            } else {
                tokio::time::sleep(self.config.item_delay()).await;
            }
        }

        // ── Step 5: Stop ─────────────────────────────────────────────────
        if let Err(e) = self.lifecycle.stop().await {
            warn!("{e}");
        }

        // ── Step 6: Summarise ────────────────────────────────────────────
        summary.processed = state.processed;
        summary.converted = state.converted;
        summary.failed = state.failed;
        summary.archive_failures = state.archive_failures;
        summary.restarts = state.restarts;
        summary.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            "Batch complete: {} processed, {} converted, {} failed, {}ms",
            summary.processed, summary.converted, summary.failed, summary.elapsed_ms
        );
        if let Some(ref cb) = cb {
            cb.on_batch_complete(summary.processed, summary.converted, summary.failed);
        }
        if let Some(log) = self.audit.as_mut() {
            if let Err(e) = log.record_summary(&summary) {
                warn!("{e}");
            }
        }

        summary
    }

    /// Convert one document and, on success, archive its original.
    async fn process(&self, item: WorkItem) -> ItemOutcome {
        let started = Instant::now();
        let name = display_name(&item.source);
        debug!("Processing {}", item.source.display());

        let (status, archived_to, error) =
            match self.oracle.convert(&item.source, &item.target).await {
                Ok(()) => {
                    info!("✓ Converted: {name}");
                    match archive::archive(&item.source, &self.config.archive_dir_name).await {
                        Ok(dest) => (ItemStatus::Converted, Some(dest), None),
                        Err(e) => {
                            // Still converted: the target exists, only the move failed.
                            error!("✗ Failed to move {name}: {e}");
                            (ItemStatus::Converted, None, Some(e))
                        }
                    }
                }
                Err(e) => {
                    error!("✗ Failed to convert {name}: {e}");
                    (ItemStatus::Failed, None, Some(e))
                }
            };

        ItemOutcome {
            source: item.source,
            target: item.target,
            status,
            archived_to,
            error,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ── Convenience entry points ─────────────────────────────────────────────

/// Classify everything under `root` without launching anything.
pub fn scan(root: impl AsRef<Path>, config: &BatchConfig) -> Result<BatchPlan, BatchError> {
    discover::plan(root, config)
}

/// Run a batch against Pages via `osascript`.
///
/// # Example
/// ```rust,no_run
/// use pages2docx::{run_batch, BatchConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = BatchConfig::default();
/// let summary = run_batch("/Users/me/Documents", &config, None, |plan| {
///     plan.pending.len() < 100
/// })
/// .await?;
/// println!("{} converted, {} failed", summary.converted, summary.failed);
/// # Ok(())
/// # }
/// ```
pub async fn run_batch<F>(
    root: impl AsRef<Path>,
    config: &BatchConfig,
    audit: Option<AuditLog>,
    confirm: F,
) -> Result<RunSummary, BatchError>
where
    F: FnOnce(&BatchPlan) -> bool,
{
    let bridge = CommandBridge::osascript();
    let oracle = PagesOracle::new(bridge.clone(), config);
    let lifecycle = PagesLifecycle::new(bridge, config);
    let mut runner = BatchRunner::new(oracle, lifecycle, config.clone());
    if let Some(log) = audit {
        runner = runner.with_audit_log(log);
    }
    runner.run(root, confirm).await
}

/// Synchronous wrapper around [`run_batch`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_batch_sync<F>(
    root: impl AsRef<Path>,
    config: &BatchConfig,
    audit: Option<AuditLog>,
    confirm: F,
) -> Result<RunSummary, BatchError>
where
    F: FnOnce(&BatchPlan) -> bool,
{
    tokio::runtime::Runtime::new()
        .map_err(|e| BatchError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_batch(root, config, audit, confirm))
}
