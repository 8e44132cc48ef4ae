//! Progress-callback trait for per-document batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::BatchConfigBuilder::progress_callback`] to receive events
//! as the orchestrator works through the batch.
//!
//! Callers can forward events to a terminal progress bar, a log, or a
//! channel without the library knowing how the host application reports
//! progress. Events arrive strictly in order because documents are
//! processed one at a time.
//!
//! # Example
//!
//! ```rust
//! use pages2docx::{BatchConfig, BatchProgressCallback};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     converted: Arc<AtomicUsize>,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_item_converted(&self, index: usize, total: usize, source: &Path, _archived: Option<&Path>) {
//!         self.converted.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} {}", index, total, source.display());
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     converted: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = BatchConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the orchestrator as it processes each document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `index` is 1-based.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after confirmation, before the application is launched.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called just before the conversion script runs for a document.
    fn on_item_start(&self, index: usize, total: usize, source: &Path) {
        let _ = (index, total, source);
    }

    /// Called when a document converted. `archived` is `None` when the
    /// original could not be moved into the archive slot.
    fn on_item_converted(&self, index: usize, total: usize, source: &Path, archived: Option<&Path>) {
        let _ = (index, total, source, archived);
    }

    /// Called when a document failed to convert.
    fn on_item_failed(&self, index: usize, total: usize, source: &Path, error: &str) {
        let _ = (index, total, source, error);
    }

    /// Called before a mid-batch restart of the application.
    fn on_restart(&self, processed: usize) {
        let _ = processed;
    }

    /// Called once after the loop ends, interrupted or not.
    fn on_batch_complete(&self, processed: usize, converted: usize, failed: usize) {
        let _ = (processed, converted, failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BatchConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        converted: AtomicUsize,
        failed: AtomicUsize,
        restarts: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_item_start(&self, _index: usize, _total: usize, _source: &Path) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_item_converted(&self, _i: usize, _t: usize, _s: &Path, _a: Option<&Path>) {
            self.converted.fetch_add(1, Ordering::SeqCst);
        }

        fn on_item_failed(&self, _i: usize, _t: usize, _s: &Path, _e: &str) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }

        fn on_restart(&self, _processed: usize) {
            self.restarts.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_item_start(1, 2, Path::new("a.pages"));
        cb.on_item_converted(1, 2, Path::new("a.pages"), None);
        cb.on_item_failed(2, 2, Path::new("b.pages"), "boom");
        cb.on_restart(2);
        cb.on_batch_complete(2, 1, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let cb: Arc<dyn BatchProgressCallback> = Arc::new(TrackingCallback::default());
        cb.on_item_start(1, 2, Path::new("a.pages"));
        cb.on_item_converted(1, 2, Path::new("a.pages"), Some(Path::new("pages/a.pages")));
        cb.on_item_start(2, 2, Path::new("b.pages"));
        cb.on_item_failed(2, 2, Path::new("b.pages"), "timeout");
        cb.on_restart(2);
        cb.on_batch_complete(2, 1, 1);
    }

    #[test]
    fn tracking_callback_counts() {
        let tracker = TrackingCallback::default();
        tracker.on_item_start(1, 1, Path::new("a.pages"));
        tracker.on_item_failed(1, 1, Path::new("a.pages"), "x");
        tracker.on_restart(1);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.failed.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.converted.load(Ordering::SeqCst), 0);
        assert_eq!(tracker.restarts.load(Ordering::SeqCst), 1);
    }
}
