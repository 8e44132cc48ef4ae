//! Pipeline stages of a batch run.
//!
//! Each submodule implements exactly one step of the per-document flow and
//! knows nothing about the others. The orchestrator in [`crate::batch`]
//! owns all sequencing.
//!
//! ## Data Flow
//!
//! ```text
//! discover ──▶ oracle ──▶ archive
//!                 ▲
//!             lifecycle (every N documents)
//! ```
//!
//! 1. [`discover`]  — walk the root and classify candidate documents
//! 2. [`bridge`]    — run one automation script with a per-call ceiling
//! 3. [`oracle`]    — open/export/close one document and verify the output
//! 4. [`lifecycle`] — launch, quit and bounce the application
//! 5. [`archive`]   — move a converted original into its archive slot

pub mod archive;
pub mod bridge;
pub mod discover;
pub mod lifecycle;
pub mod oracle;
