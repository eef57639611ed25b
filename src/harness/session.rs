//! Debugger session lifecycle
//!
//! At most one session is live at a time. A session owns its debugger, a
//! scratch directory for checkpoint images and the bookkeeping needed to turn
//! `fred-restart` into an explicit checkpoint index.
//!
//! ```text
//! CLOSED --start--> STARTING --ok--> ACTIVE --end--> ENDING --> CLOSED
//!                      |
//!                      +--fail--> CLOSED
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use crate::common::{with_timeout, Error, Result};
use crate::coordinator::Coordinator;
use crate::fred::{Debugger, DebuggerLauncher, LaunchSpec, Position, Value};

use super::script::Directive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Starting,
    Active,
    Ending,
}

/// Checkpoints taken in the current session, numbered from 0
#[derive(Debug, Clone, Default)]
pub struct CheckpointIndex {
    taken: usize,
}

impl CheckpointIndex {
    /// Record a new checkpoint and return its index
    pub fn record(&mut self) -> usize {
        let index = self.taken;
        self.taken += 1;
        index
    }

    pub fn taken(&self) -> usize {
        self.taken
    }

    /// Resolve a restart target; `None` means the most recent checkpoint
    pub fn resolve(&self, index: Option<usize>) -> Result<usize> {
        match index {
            Some(i) if i < self.taken => Ok(i),
            Some(i) => Err(Error::CheckpointOutOfRange {
                index: i,
                taken: self.taken,
            }),
            None if self.taken > 0 => Ok(self.taken - 1),
            None => Err(Error::CheckpointOutOfRange { index: 0, taken: 0 }),
        }
    }

    pub fn reset(&mut self) {
        self.taken = 0;
    }
}

/// One live debugger session
pub struct Session {
    id: u64,
    debugger: Option<Box<dyn Debugger>>,
    checkpoints: CheckpointIndex,
    scratch: Option<TempDir>,
    directive_timeout: Duration,
}

impl Session {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn checkpoints(&self) -> &CheckpointIndex {
        &self.checkpoints
    }

    /// Directory holding this session's checkpoint images
    pub fn checkpoint_dir(&self) -> Option<&Path> {
        self.scratch.as_ref().map(TempDir::path)
    }

    fn debugger(&mut self) -> Result<&mut (dyn Debugger + 'static)> {
        self.debugger.as_deref_mut().ok_or(Error::SessionNotActive)
    }

    /// Deliver one directive, waiting until the debugger is ready again
    pub async fn apply(&mut self, directive: &Directive) -> Result<()> {
        // Restarts always go out with an explicit index so they cannot depend
        // on the debugger's notion of "latest".
        let resolved;
        let directive = match directive {
            Directive::Restart { index } => {
                resolved = Directive::Restart {
                    index: Some(self.checkpoints.resolve(*index)?),
                };
                &resolved
            }
            other => other,
        };

        tracing::debug!(session = self.id, %directive, "Applying directive");
        let limit = self.directive_timeout;
        with_timeout(limit, self.debugger()?.execute(directive)).await?;

        if matches!(directive, Directive::Checkpoint) {
            let index = self.checkpoints.record();
            tracing::debug!(session = self.id, index, "Checkpoint recorded");
        }
        Ok(())
    }

    pub async fn evaluate(&mut self, expr: &str) -> Result<Value> {
        let limit = self.directive_timeout;
        with_timeout(limit, self.debugger()?.evaluate(expr)).await
    }

    pub async fn current_position(&mut self) -> Result<Position> {
        let limit = self.directive_timeout;
        with_timeout(limit, self.debugger()?.current_position()).await
    }

    pub async fn at_breakpoint(&mut self) -> Result<bool> {
        let limit = self.directive_timeout;
        with_timeout(limit, self.debugger()?.at_breakpoint()).await
    }
}

/// Options for starting a session
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub coordinator_port: u16,
    pub debug: bool,
    pub show_output: bool,
}

/// Starts and ends sessions, keeping at most one alive
pub struct SessionManager {
    coordinator: Arc<dyn Coordinator>,
    launcher: Arc<dyn DebuggerLauncher>,
    directive_timeout: Duration,
    state: SessionState,
    active: Option<Session>,
    next_id: u64,
}

impl SessionManager {
    pub fn new(
        coordinator: Arc<dyn Coordinator>,
        launcher: Arc<dyn DebuggerLauncher>,
        directive_timeout: Duration,
    ) -> Self {
        Self {
            coordinator,
            launcher,
            directive_timeout,
            state: SessionState::Closed,
            active: None,
            next_id: 1,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn active_mut(&mut self) -> Result<&mut Session> {
        self.active.as_mut().ok_or(Error::SessionNotActive)
    }

    /// Launch the debugger on a command line
    ///
    /// On failure nothing is left behind: peers that may have registered with
    /// the coordinator are killed and the manager returns to `Closed`.
    pub async fn start(
        &mut self,
        command_line: Vec<String>,
        options: SessionOptions,
    ) -> Result<&mut Session> {
        if self.active.is_some() {
            return Err(Error::SessionAlreadyActive);
        }

        self.state = SessionState::Starting;
        let id = self.next_id;
        self.next_id += 1;

        let scratch = match tempfile::Builder::new().prefix("fredtest-ckpt-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                self.state = SessionState::Closed;
                return Err(Error::DebuggerStartFailed(format!(
                    "cannot create checkpoint directory: {}",
                    e
                )));
            }
        };

        let spec = LaunchSpec {
            command_line,
            coordinator_port: options.coordinator_port,
            debug: options.debug,
            show_output: options.show_output,
            checkpoint_dir: scratch.path().to_path_buf(),
        };

        tracing::info!(session = id, command_line = ?spec.command_line, "Starting debugger session");

        match self.launcher.start(&spec).await {
            Ok(debugger) => {
                self.state = SessionState::Active;
                Ok(self.active.insert(Session {
                    id,
                    debugger: Some(debugger),
                    checkpoints: CheckpointIndex::default(),
                    scratch: Some(scratch),
                    directive_timeout: self.directive_timeout,
                }))
            }
            Err(e) => {
                tracing::warn!(session = id, error = %e, "Debugger session failed to start");
                if let Err(kill_err) = self.coordinator.kill_peers().await {
                    tracing::warn!(error = %kill_err, "Failed to kill peers after failed start");
                }
                self.state = SessionState::Closed;
                Err(e)
            }
        }
    }

    /// Tear the active session down; a no-op when none is active
    ///
    /// Every step runs even if an earlier one failed. The failures are
    /// reported together once the manager is back in `Closed`.
    pub async fn end(&mut self) -> Result<()> {
        let Some(session) = self.active.as_mut() else {
            return Ok(());
        };

        self.state = SessionState::Ending;
        let id = session.id;
        let mut failures = Vec::new();

        if let Err(e) = self.coordinator.kill_peers().await {
            failures.push(format!("kill peers: {}", e));
        }

        session.checkpoints.reset();

        if let Some(dir) = session.scratch.take() {
            let path = dir.path().display().to_string();
            if let Err(e) = dir.close() {
                failures.push(format!("remove {}: {}", path, e));
            }
        }

        if let Some(debugger) = session.debugger.take() {
            if let Err(e) = debugger.destroy().await {
                failures.push(format!("destroy debugger: {}", e));
            }
        }

        self.active = None;
        self.state = SessionState::Closed;

        if failures.is_empty() {
            tracing::info!(session = id, "Debugger session ended");
            Ok(())
        } else {
            let message = failures.join("; ");
            tracing::warn!(session = id, %message, "Debugger session ended with errors");
            Err(Error::Teardown(message))
        }
    }
}
