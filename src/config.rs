//! Configuration types for a batch conversion run.
//!
//! All batch behaviour is controlled through [`BatchConfig`], built via its
//! [`BatchConfigBuilder`]. Discovery, conversion and archival all read the
//! same suffixes and folder name from here, so the "already converted" check
//! and the archive collision logic can never disagree about what a target or
//! archive path looks like.
//!
//! # Design choice: builder over constructor
//! Most callers only change one or two knobs (the restart cadence, the
//! per-call timeout). The builder lets them set only what they care about and
//! rely on the defaults for the rest.

use crate::error::BatchError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a batch conversion run.
///
/// Built via [`BatchConfig::builder()`] or using [`BatchConfig::default()`].
///
/// # Example
/// ```rust
/// use pages2docx::BatchConfig;
///
/// let config = BatchConfig::builder()
///     .restart_every(10)
///     .call_timeout_secs(120)
///     .build()
///     .unwrap();
/// assert_eq!(config.restart_policy.every, 10);
/// ```
#[derive(Clone)]
pub struct BatchConfig {
    /// Suffix of the documents to convert, without the dot. Default: `pages`.
    ///
    /// Matched case-insensitively against file and bundle names.
    pub source_extension: String,

    /// Suffix of the produced documents, without the dot. Default: `docx`.
    ///
    /// The target path of a document is its source path with this suffix, so
    /// a later run skips anything whose target already exists.
    pub target_extension: String,

    /// Export format name passed to the application. Default: `Microsoft Word`.
    pub export_format: String,

    /// Name of the per-directory archive slot. Default: `pages`.
    ///
    /// Anything below the root with a path segment of this name is treated as
    /// already archived and never re-processed.
    pub archive_dir_name: String,

    /// Application driven through the scripting bridge. Default: `Pages`.
    pub application: String,

    /// When to bounce the application during the batch.
    pub restart_policy: RestartPolicy,

    /// Wait after asking the application to quit, in milliseconds. Default: 3000.
    ///
    /// The application exposes no "has exited" signal, so a fixed settle
    /// delay is the only way to let it release memory before relaunching.
    pub quit_settle_ms: u64,

    /// Wait after launching the application, in milliseconds. Default: 2000.
    pub launch_settle_ms: u64,

    /// Delay inside the conversion script between open and export, in seconds. Default: 1.
    pub open_delay_secs: u64,

    /// Pause between two documents, in milliseconds. Default: 500.
    pub item_delay_ms: u64,

    /// Ceiling for a single scripting call, in seconds. Default: 300.
    ///
    /// A call that exceeds it is recorded as [`crate::error::ItemError::Timeout`]
    /// and the batch moves on to the next document.
    pub call_timeout_secs: u64,

    /// Optional progress callback, see [`crate::progress`].
    pub progress_callback: Option<ProgressCallback>,

    /// Cancellation flag checked between documents.
    pub cancel: CancelFlag,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            source_extension: "pages".to_string(),
            target_extension: "docx".to_string(),
            export_format: "Microsoft Word".to_string(),
            archive_dir_name: "pages".to_string(),
            application: "Pages".to_string(),
            restart_policy: RestartPolicy::default(),
            quit_settle_ms: 3000,
            launch_settle_ms: 2000,
            open_delay_secs: 1,
            item_delay_ms: 500,
            call_timeout_secs: 300,
            progress_callback: None,
            cancel: CancelFlag::default(),
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("source_extension", &self.source_extension)
            .field("target_extension", &self.target_extension)
            .field("export_format", &self.export_format)
            .field("archive_dir_name", &self.archive_dir_name)
            .field("application", &self.application)
            .field("restart_policy", &self.restart_policy)
            .field("quit_settle_ms", &self.quit_settle_ms)
            .field("launch_settle_ms", &self.launch_settle_ms)
            .field("item_delay_ms", &self.item_delay_ms)
            .field("call_timeout_secs", &self.call_timeout_secs)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn BatchProgressCallback>"),
            )
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl BatchConfig {
    /// Create a new builder for `BatchConfig`.
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn quit_settle(&self) -> Duration {
        Duration::from_millis(self.quit_settle_ms)
    }

    pub fn launch_settle(&self) -> Duration {
        Duration::from_millis(self.launch_settle_ms)
    }

    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }
}

/// Builder for [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn source_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.source_extension = normalise_extension(ext.into());
        self
    }

    pub fn target_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.target_extension = normalise_extension(ext.into());
        self
    }

    pub fn export_format(mut self, format: impl Into<String>) -> Self {
        self.config.export_format = format.into();
        self
    }

    pub fn archive_dir_name(mut self, name: impl Into<String>) -> Self {
        self.config.archive_dir_name = name.into();
        self
    }

    pub fn application(mut self, app: impl Into<String>) -> Self {
        self.config.application = app.into();
        self
    }

    pub fn restart_every(mut self, n: usize) -> Self {
        self.config.restart_policy.every = n;
        self
    }

    pub fn restart_on_failure(mut self, v: bool) -> Self {
        self.config.restart_policy.on_failure = v;
        self
    }

    pub fn restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.config.restart_policy = policy;
        self
    }

    pub fn quit_settle_ms(mut self, ms: u64) -> Self {
        self.config.quit_settle_ms = ms;
        self
    }

    pub fn launch_settle_ms(mut self, ms: u64) -> Self {
        self.config.launch_settle_ms = ms;
        self
    }

    pub fn open_delay_secs(mut self, secs: u64) -> Self {
        self.config.open_delay_secs = secs;
        self
    }

    pub fn item_delay_ms(mut self, ms: u64) -> Self {
        self.config.item_delay_ms = ms;
        self
    }

    pub fn call_timeout_secs(mut self, secs: u64) -> Self {
        self.config.call_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.config.cancel = flag;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BatchConfig, BatchError> {
        let c = &self.config;
        if c.source_extension.is_empty() || c.target_extension.is_empty() {
            return Err(BatchError::InvalidConfig(
                "Source and target extensions must not be empty".into(),
            ));
        }
        if c.source_extension.eq_ignore_ascii_case(&c.target_extension) {
            return Err(BatchError::InvalidConfig(format!(
                "Source and target extensions must differ, both are '{}'",
                c.source_extension
            )));
        }
        if c.archive_dir_name.is_empty()
            || c.archive_dir_name.contains(['/', '\\'])
            || c.archive_dir_name == "."
            || c.archive_dir_name == ".."
        {
            return Err(BatchError::InvalidConfig(format!(
                "Archive folder must be a plain folder name, got '{}'",
                c.archive_dir_name
            )));
        }
        if c.restart_policy.every == 0 {
            return Err(BatchError::InvalidConfig(
                "Restart cadence must be ≥ 1".into(),
            ));
        }
        if c.call_timeout_secs == 0 {
            return Err(BatchError::InvalidConfig(
                "Call timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

fn normalise_extension(ext: String) -> String {
    ext.trim().trim_start_matches('.').to_string()
}

// ── Restart policy ───────────────────────────────────────────────────────

/// When the orchestrator bounces the application mid-batch.
///
/// The application degrades with the amount of work it has done (memory
/// growth), not with failures, so the cadence is always active. Restarting
/// after a failure is an optional extra on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartPolicy {
    /// Restart after this many processed documents. Default: 5.
    pub every: usize,
    /// Also restart right after a failed conversion. Default: false.
    pub on_failure: bool,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            every: 5,
            on_failure: false,
        }
    }
}

impl RestartPolicy {
    /// Decide whether to restart given the documents processed since the
    /// last restart and the outcome of the one just finished.
    pub fn should_restart(&self, items_since_restart: usize, last_failed: bool) -> bool {
        items_since_restart >= self.every || (self.on_failure && last_failed)
    }
}

// ── Cancellation ─────────────────────────────────────────────────────────

/// Shared flag that asks the batch to stop before the next document.
///
/// A conversion already in flight always runs to completion; the flag is
/// only observed between documents.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = BatchConfig::default();
        assert_eq!(config.source_extension, "pages");
        assert_eq!(config.target_extension, "docx");
        assert_eq!(config.archive_dir_name, "pages");
        assert_eq!(config.restart_policy.every, 5);
        assert!(!config.restart_policy.on_failure);
        assert_eq!(config.quit_settle(), Duration::from_secs(3));
        assert_eq!(config.launch_settle(), Duration::from_secs(2));
        assert_eq!(config.item_delay(), Duration::from_millis(500));
    }

    #[test]
    fn builder_strips_leading_dot_from_extensions() {
        let config = BatchConfig::builder()
            .source_extension(".key")
            .target_extension(".pptx")
            .build()
            .unwrap();
        assert_eq!(config.source_extension, "key");
        assert_eq!(config.target_extension, "pptx");
    }

    #[test]
    fn build_rejects_zero_cadence() {
        let err = BatchConfig::builder().restart_every(0).build().unwrap_err();
        assert!(matches!(err, BatchError::InvalidConfig(_)));
    }

    #[test]
    fn build_rejects_same_extensions() {
        let err = BatchConfig::builder()
            .target_extension("PAGES")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn build_rejects_nested_archive_name() {
        assert!(BatchConfig::builder()
            .archive_dir_name("a/b")
            .build()
            .is_err());
        assert!(BatchConfig::builder().archive_dir_name("..").build().is_err());
    }

    #[test]
    fn build_rejects_zero_timeout() {
        assert!(BatchConfig::builder().call_timeout_secs(0).build().is_err());
    }

    #[test]
    fn cadence_policy_ignores_failures() {
        let policy = RestartPolicy::default();
        assert!(!policy.should_restart(1, true));
        assert!(!policy.should_restart(4, false));
        assert!(policy.should_restart(5, false));
    }

    #[test]
    fn failure_policy_restarts_after_failure() {
        let policy = RestartPolicy {
            every: 5,
            on_failure: true,
        };
        assert!(policy.should_restart(1, true));
        assert!(!policy.should_restart(1, false));
    }

    #[test]
    fn cancel_flag_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!flag.is_cancelled());
        clone.cancel();
        assert!(flag.is_cancelled());
    }
}
