//! Error types for the pages2docx library.
//!
//! Three distinct error types reflect three distinct failure modes:
//!
//! * [`BatchError`] — **Fatal**: the batch cannot start at all (root
//!   directory missing, invalid configuration, user declined). Returned as
//!   `Err(BatchError)` from [`crate::batch::BatchRunner::run`] before any
//!   document is touched.
//!
//! * [`ItemError`] — **Non-fatal**: a single document failed to convert or
//!   could not be archived. Stored inside [`crate::output::ItemOutcome`] so
//!   the final summary can enumerate every failure with enough detail to
//!   retry it by hand.
//!
//! * [`LifecycleError`] — **Non-fatal**: quitting or launching the
//!   application did not succeed. Logged only; the next conversion attempt
//!   shows whether the application actually recovered.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pages2docx library.
///
/// Per-document failures use [`ItemError`] and are stored in
/// [`crate::output::ItemOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum BatchError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Root directory does not exist.
    #[error("Directory not found: '{path}'\nCheck the path exists and is readable.")]
    DirectoryNotFound { path: PathBuf },

    /// Root path exists but is a regular file.
    #[error("Not a directory: '{path}'\nPass the folder that contains the documents.")]
    NotADirectory { path: PathBuf },

    // ── Control flow ──────────────────────────────────────────────────────
    /// The confirmation prompt was answered with anything but yes.
    #[error("Cancelled by user")]
    Declined,

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// The audit log could not be created or appended to.
    #[error("Failed to write audit log '{path}': {source}")]
    AuditLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single document.
///
/// The batch always continues with the next document.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemError {
    /// The application reported an error (or the script exited non-zero).
    #[error("conversion failed (error {code}): {message}")]
    Conversion { code: i64, message: String },

    /// The script did not answer within the per-call ceiling.
    #[error("conversion timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The application claimed success but the target file never appeared.
    #[error("conversion reported success but '{}' was not created", target.display())]
    MissingOutput { target: PathBuf },

    /// The script runner itself could not be started.
    #[error("could not run conversion script: {detail}")]
    Launch { detail: String },

    /// The document converted but moving the original into the archive failed.
    #[error("could not archive '{}': {detail}", path.display())]
    Archive { path: PathBuf, detail: String },
}

impl ItemError {
    /// True when this error means the document was *not* converted.
    ///
    /// Archive failures happen after a successful conversion and therefore
    /// never count against the conversion tally.
    pub fn is_conversion_failure(&self) -> bool {
        !matches!(self, ItemError::Archive { .. })
    }
}

/// A failure while quitting or launching the application.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("failed to quit {app}: {detail}")]
    Quit { app: String, detail: String },

    #[error("failed to launch {app}: {detail}")]
    Activate { app: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_not_found_display() {
        let e = BatchError::DirectoryNotFound {
            path: PathBuf::from("/no/such/dir"),
        };
        assert!(e.to_string().contains("/no/such/dir"));
    }

    #[test]
    fn conversion_error_display() {
        let e = ItemError::Conversion {
            code: -1728,
            message: "Can't get document".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("-1728"), "got: {msg}");
        assert!(msg.contains("Can't get document"));
    }

    #[test]
    fn timeout_display() {
        let e = ItemError::Timeout { secs: 300 };
        assert!(e.to_string().contains("300s"));
    }

    #[test]
    fn archive_error_is_not_a_conversion_failure() {
        let archive = ItemError::Archive {
            path: PathBuf::from("a.pages"),
            detail: "permission denied".into(),
        };
        assert!(!archive.is_conversion_failure());
        assert!(ItemError::Timeout { secs: 1 }.is_conversion_failure());
        assert!(ItemError::MissingOutput {
            target: PathBuf::from("a.docx")
        }
        .is_conversion_failure());
    }

    #[test]
    fn item_error_serialises_with_kind_tag() {
        let e = ItemError::Timeout { secs: 5 };
        let json = serde_json::to_string(&e).unwrap();
        assert_eq!(json, r#"{"kind":"timeout","secs":5}"#);
    }

    #[test]
    fn lifecycle_error_display() {
        let e = LifecycleError::Activate {
            app: "Pages".into(),
            detail: "not installed".into(),
        };
        assert_eq!(e.to_string(), "failed to launch Pages: not installed");
    }
}
