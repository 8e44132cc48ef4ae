//! # pages2docx
//!
//! Batch-convert Pages documents to Word by driving Pages itself through
//! AppleScript.
//!
//! ## Why drive the application?
//!
//! Pages is the only thing that reads its own format faithfully, and it has
//! no command-line interface. This crate therefore delegates every
//! conversion to the running application and concentrates on the
//! orchestration around it: finding the work, resuming an interrupted batch
//! without redoing anything, restarting the application before its memory
//! growth makes it hang, and moving originals out of the way without ever
//! losing or overwriting one.
//!
//! ## Pipeline Overview
//!
//! ```text
//! root folder
//!  │
//!  ├─ 1. Discover  classify every *.pages: pending / already converted / archived
//!  ├─ 2. Confirm   nothing is launched or moved before the caller agrees
//!  ├─ 3. Launch    bounce Pages so the batch starts from a fresh instance
//!  ├─ 4. Convert   open → export → close, one document at a time, verified on disk
//!  ├─ 5. Archive   move each converted original into ./pages/ (never overwrite)
//!  ├─ 6. Restart   quit + relaunch Pages every N documents
//!  └─ 7. Summary   counts, elapsed time, every failure with its reason
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pages2docx::{run_batch, BatchConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BatchConfig::builder().restart_every(5).build()?;
//!     let summary = run_batch("/Users/me/Documents", &config, None, |_plan| true).await?;
//!     eprintln!(
//!         "processed {} · converted {} · failed {}",
//!         summary.processed, summary.converted, summary.failed
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pages2docx` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## Other applications
//!
//! [`BatchRunner`] is generic over a [`ConversionOracle`] and an
//! [`AppLifecycle`]. Keynote or Numbers work with the stock implementations
//! by changing the application name, extensions and export format in
//! [`BatchConfig`]; a different platform mechanism only needs a new
//! [`ScriptBridge`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod audit;
pub mod batch;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod script;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use audit::AuditLog;
pub use batch::{run_batch, run_batch_sync, scan, BatchRunner};
pub use config::{BatchConfig, BatchConfigBuilder, CancelFlag, RestartPolicy};
pub use error::{BatchError, ItemError, LifecycleError};
pub use output::{BatchPlan, ItemOutcome, ItemStatus, RunSummary, WorkItem};
pub use pipeline::bridge::{CommandBridge, ScriptBridge, ScriptOutput};
pub use pipeline::lifecycle::{AppLifecycle, AppState, PagesLifecycle};
pub use pipeline::oracle::{ConversionOracle, PagesOracle};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
