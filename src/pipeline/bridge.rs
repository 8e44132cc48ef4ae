//! Script bridge: run one automation script in a child process.
//!
//! Everything the crate asks of the application goes through this seam:
//! the conversion oracle and the lifecycle manager both hand a script to a
//! [`ScriptBridge`] and interpret the reply. Swapping the platform mechanism
//! means swapping the bridge; nothing else changes.
//!
//! ## Timeouts
//!
//! The application can hang indefinitely. [`CommandBridge`] runs the
//! interpreter under `tokio::time::timeout` with `kill_on_drop(true)`, so
//! when the ceiling is hit the helper process is killed and reaped and the
//! call returns [`BridgeError::Timeout`]. The application itself keeps
//! whatever state it was in; the next scheduled restart deals with that.
//!
//! ## Interrupts
//!
//! On unix the helper runs in its own process group. A Ctrl-C in the
//! terminal reaches only this process, whose handler stops the batch between
//! documents; the export already under way runs to completion.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// What the interpreter printed and how it exited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptOutput {
    /// Exit status was zero.
    pub success: bool,
    /// Exit code, `None` if killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// The script could not be run to completion.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("script did not finish within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("failed while waiting for script: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs automation scripts.
///
/// Implementations must be safe to share but are only ever called
/// sequentially: one script at a time.
pub trait ScriptBridge: Send + Sync {
    /// Run `script`, waiting at most `timeout` for it to finish.
    fn run(
        &self,
        script: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<ScriptOutput, BridgeError>> + Send;
}

/// Bridge that passes each script to an interpreter on the command line.
///
/// [`CommandBridge::osascript`] is the production bridge (`osascript -e
/// <script>`).
#[derive(Debug, Clone)]
pub struct CommandBridge {
    program: PathBuf,
    script_flag: String,
}

impl Default for CommandBridge {
    fn default() -> Self {
        Self::osascript()
    }
}

impl CommandBridge {
    /// `osascript -e <script>`.
    pub fn osascript() -> Self {
        Self::with_interpreter("osascript", "-e")
    }

    /// Any interpreter that accepts a script after a flag, e.g. `sh -c`.
    pub fn with_interpreter(program: impl Into<PathBuf>, script_flag: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            script_flag: script_flag.into(),
        }
    }
}

impl ScriptBridge for CommandBridge {
    async fn run(&self, script: &str, timeout: Duration) -> Result<ScriptOutput, BridgeError> {
        let mut command = Command::new(&self.program);
        command
            .arg(&self.script_flag)
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Keep terminal SIGINT away from the in-flight script.
        #[cfg(unix)]
        command.process_group(0);

        let child = command
            .spawn()
            .map_err(|e| BridgeError::Spawn {
                program: self.program.display().to_string(),
                source: e,
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => return Err(BridgeError::Timeout(timeout)),
        };

        let out = ScriptOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        };
        debug!(
            "Script exited with {:?}: stdout={:?} stderr={:?}",
            out.code, out.stdout, out.stderr
        );
        Ok(out)
    }
}
