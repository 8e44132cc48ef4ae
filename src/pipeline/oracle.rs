//! Conversion oracle: ask the application to convert one document.
//!
//! The application does the actual format conversion; this module only
//! sends the open/export/close script and decides whether the conversion
//! really happened.
//!
//! ## Trust, but verify
//!
//! The application is known to misreport. A conversion counts as successful
//! only when **both** hold:
//!
//! 1. the script reported no error and exited with status zero, and
//! 2. the target file exists on disk afterwards.
//!
//! A clean reply with no target file is [`ItemError::MissingOutput`].
//!
//! The adapter never touches the source document. The script closes it
//! without saving.

use crate::config::BatchConfig;
use crate::error::ItemError;
use crate::pipeline::bridge::{BridgeError, ScriptBridge, ScriptOutput};
use crate::script::convert_script;
use once_cell::sync::Lazy;
use regex::Regex;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// `ERROR <num>: <msg>` as produced by [`crate::script::convert_script`].
static ERROR_REPLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^ERROR\s+(-?\d+):\s*(.*)$").unwrap());

/// Error code used when the application gives no number of its own.
pub const UNKNOWN_ERROR_CODE: i64 = -1;

/// Converts one source document into one target document.
pub trait ConversionOracle: Send + Sync {
    /// Convert `source` into `target`.
    ///
    /// Must never modify or delete `source`. Returns `Ok(())` only if
    /// `target` exists afterwards.
    fn convert(
        &self,
        source: &Path,
        target: &Path,
    ) -> impl Future<Output = Result<(), ItemError>> + Send;
}

/// Oracle backed by Pages (or any application with the same scripting
/// dictionary) through a [`ScriptBridge`].
#[derive(Debug, Clone)]
pub struct PagesOracle<B> {
    bridge: B,
    application: String,
    export_format: String,
    open_delay_secs: u64,
    timeout: Duration,
}

impl<B: ScriptBridge> PagesOracle<B> {
    pub fn new(bridge: B, config: &BatchConfig) -> Self {
        Self {
            bridge,
            application: config.application.clone(),
            export_format: config.export_format.clone(),
            open_delay_secs: config.open_delay_secs,
            timeout: config.call_timeout(),
        }
    }
}

impl<B: ScriptBridge> ConversionOracle for PagesOracle<B> {
    async fn convert(&self, source: &Path, target: &Path) -> Result<(), ItemError> {
        let script = convert_script(
            &self.application,
            source,
            target,
            &self.export_format,
            self.open_delay_secs,
        );
        debug!("Converting {} → {}", source.display(), target.display());

        let output = self
            .bridge
            .run(&script, self.timeout)
            .await
            .map_err(|e| match e {
                BridgeError::Timeout(d) => ItemError::Timeout { secs: d.as_secs() },
                other => ItemError::Launch {
                    detail: other.to_string(),
                },
            })?;

        classify_reply(&output, target)
    }
}

/// Turn a script reply plus the state of the filesystem into an outcome.
pub fn classify_reply(output: &ScriptOutput, target: &Path) -> Result<(), ItemError> {
    if let Some(caps) = ERROR_REPLY.captures(&output.stdout) {
        let code = caps[1].parse().unwrap_or(UNKNOWN_ERROR_CODE);
        return Err(ItemError::Conversion {
            code,
            message: caps[2].trim().to_string(),
        });
    }

    if !output.success {
        let message = [&output.stderr, &output.stdout]
            .into_iter()
            .find(|s| !s.is_empty())
            .cloned()
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(ItemError::Conversion {
            code: output.code.map(i64::from).unwrap_or(UNKNOWN_ERROR_CODE),
            message,
        });
    }

    if !target.exists() {
        warn!(
            "Application reported success but {} does not exist",
            target.display()
        );
        return Err(ItemError::MissingOutput {
            target: target.to_path_buf(),
        });
    }

    Ok(())
}
