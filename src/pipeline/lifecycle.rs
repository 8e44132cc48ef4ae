//! Application lifecycle: launch, quit and periodically bounce the application.
//!
//! ## Why restart at all?
//!
//! The application leaks memory across conversions and eventually slows to a
//! crawl or hangs. Quitting and relaunching it every few documents bounds
//! that growth. The orchestrator decides *when*; this module only knows
//! *how*.
//!
//! ## State machine
//!
//! ```text
//! Stopped ──▶ Starting ──▶ Running ──▶ Stopping ──▶ Stopped
//! ```
//!
//! The application exposes no readiness signal, so each transition waits a
//! fixed settle delay after the script returns. Failures are reported to the
//! caller but are never fatal: the next conversion shows whether the
//! application really came back.

use crate::config::BatchConfig;
use crate::error::LifecycleError;
use crate::pipeline::bridge::{ScriptBridge, ScriptOutput};
use crate::script::{activate_script, quit_script};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

/// Where the managed application is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AppState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Starts, stops and restarts the external application.
pub trait AppLifecycle: Send {
    fn state(&self) -> AppState;

    /// Make sure the application is up.
    ///
    /// From any state other than `Running` this performs a full bounce, since
    /// an instance started outside this process may already be degraded.
    fn ensure_running(&mut self) -> impl Future<Output = Result<(), LifecycleError>> + Send;

    /// Quit then relaunch the application.
    fn restart(&mut self) -> impl Future<Output = Result<(), LifecycleError>> + Send;

    /// Quit the application.
    fn stop(&mut self) -> impl Future<Output = Result<(), LifecycleError>> + Send;
}

/// Lifecycle manager driving the application through a [`ScriptBridge`].
#[derive(Debug, Clone)]
pub struct PagesLifecycle<B> {
    bridge: B,
    application: String,
    quit_settle: Duration,
    launch_settle: Duration,
    timeout: Duration,
    state: AppState,
}

impl<B: ScriptBridge> PagesLifecycle<B> {
    pub fn new(bridge: B, config: &BatchConfig) -> Self {
        Self {
            bridge,
            application: config.application.clone(),
            quit_settle: config.quit_settle(),
            launch_settle: config.launch_settle(),
            timeout: config.call_timeout(),
            state: AppState::Stopped,
        }
    }

    async fn quit(&mut self) -> Result<(), LifecycleError> {
        self.state = AppState::Stopping;
        debug!("Quitting {}", self.application);
        let result = self
            .bridge
            .run(&quit_script(&self.application), self.timeout)
            .await;
        sleep(self.quit_settle).await;
        // Stopped even on failure: there is nothing more we can do to it.
        self.state = AppState::Stopped;

        check(result).map_err(|detail| LifecycleError::Quit {
            app: self.application.clone(),
            detail,
        })
    }

    async fn launch(&mut self) -> Result<(), LifecycleError> {
        self.state = AppState::Starting;
        debug!("Launching {}", self.application);
        let result = self
            .bridge
            .run(&activate_script(&self.application), self.timeout)
            .await;
        sleep(self.launch_settle).await;

        match check(result) {
            Ok(()) => {
                self.state = AppState::Running;
                Ok(())
            }
            Err(detail) => {
                self.state = AppState::Stopped;
                Err(LifecycleError::Activate {
                    app: self.application.clone(),
                    detail,
                })
            }
        }
    }

    async fn bounce(&mut self) -> Result<(), LifecycleError> {
        let quit = self.quit().await;
        let launch = self.launch().await;
        // Report the quit failure first; it usually explains the launch failure.
        quit.and(launch)
    }
}

impl<B: ScriptBridge> AppLifecycle for PagesLifecycle<B> {
    fn state(&self) -> AppState {
        self.state
    }

    async fn ensure_running(&mut self) -> Result<(), LifecycleError> {
        if self.state == AppState::Running {
            return Ok(());
        }
        info!("Starting {}", self.application);
        self.bounce().await
    }

    async fn restart(&mut self) -> Result<(), LifecycleError> {
        info!("Restarting {} for memory cleanup...", self.application);
        self.bounce().await
    }

    async fn stop(&mut self) -> Result<(), LifecycleError> {
        info!("Quitting {}", self.application);
        self.quit().await
    }
}

fn check<E: std::fmt::Display>(result: Result<ScriptOutput, E>) -> Result<(), String> {
    match result {
        Ok(out) if out.success => Ok(()),
        Ok(out) if !out.stderr.is_empty() => Err(out.stderr),
        Ok(out) => Err(format!("script exited with {:?}", out.code)),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::bridge::BridgeError;
    use std::sync::{Arc, Mutex};

    /// Records scripts; fails any script containing one of `failing`.
    #[derive(Clone, Default)]
    struct RecordingBridge {
        scripts: Arc<Mutex<Vec<String>>>,
        failing: Vec<&'static str>,
    }

    impl ScriptBridge for RecordingBridge {
        async fn run(&self, script: &str, _timeout: Duration) -> Result<ScriptOutput, BridgeError> {
            self.scripts.lock().unwrap().push(script.to_string());
            let success = !self.failing.iter().any(|f| script.contains(f));
            Ok(ScriptOutput {
                success,
                code: Some(if success { 0 } else { 1 }),
                stdout: String::new(),
                stderr: if success {
                    String::new()
                } else {
                    "execution error".into()
                },
            })
        }
    }

    fn instant_config() -> BatchConfig {
        BatchConfig::builder()
            .quit_settle_ms(0)
            .launch_settle_ms(0)
            .build()
            .unwrap()
    }

    fn verbs(bridge: &RecordingBridge) -> Vec<&'static str> {
        bridge
            .scripts
            .lock()
            .unwrap()
            .iter()
            .map(|s| if s.ends_with("quit") { "quit" } else { "activate" })
            .collect()
    }

    #[tokio::test]
    async fn ensure_running_bounces_from_stopped() {
        let bridge = RecordingBridge::default();
        let mut lifecycle = PagesLifecycle::new(bridge.clone(), &instant_config());
        assert_eq!(lifecycle.state(), AppState::Stopped);

        lifecycle.ensure_running().await.unwrap();
        assert_eq!(lifecycle.state(), AppState::Running);
        assert_eq!(verbs(&bridge), vec!["quit", "activate"]);

        // Already running: no further scripts.
        lifecycle.ensure_running().await.unwrap();
        assert_eq!(verbs(&bridge).len(), 2);
    }

    #[tokio::test]
    async fn restart_quits_then_activates() {
        let bridge = RecordingBridge::default();
        let mut lifecycle = PagesLifecycle::new(bridge.clone(), &instant_config());
        lifecycle.ensure_running().await.unwrap();
        lifecycle.restart().await.unwrap();
        assert_eq!(lifecycle.state(), AppState::Running);
        assert_eq!(verbs(&bridge), vec!["quit", "activate", "quit", "activate"]);
    }

    #[tokio::test]
    async fn stop_ends_stopped() {
        let bridge = RecordingBridge::default();
        let mut lifecycle = PagesLifecycle::new(bridge.clone(), &instant_config());
        lifecycle.ensure_running().await.unwrap();
        lifecycle.stop().await.unwrap();
        assert_eq!(lifecycle.state(), AppState::Stopped);
    }

    #[tokio::test]
    async fn quit_failure_still_launches() {
        let bridge = RecordingBridge {
            failing: vec!["to quit"],
            ..Default::default()
        };
        let mut lifecycle = PagesLifecycle::new(bridge.clone(), &instant_config());

        let err = lifecycle.restart().await.unwrap_err();
        assert!(matches!(err, LifecycleError::Quit { .. }));
        assert_eq!(verbs(&bridge), vec!["quit", "activate"]);
        assert_eq!(lifecycle.state(), AppState::Running);
    }

    #[tokio::test]
    async fn launch_failure_leaves_stopped() {
        let bridge = RecordingBridge {
            failing: vec!["to activate"],
            ..Default::default()
        };
        let mut lifecycle = PagesLifecycle::new(bridge, &instant_config());

        let err = lifecycle.ensure_running().await.unwrap_err();
        assert!(matches!(err, LifecycleError::Activate { .. }));
        assert_eq!(lifecycle.state(), AppState::Stopped);
    }
}
