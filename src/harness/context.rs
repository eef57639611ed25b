//! Run-wide harness state
//!
//! One [`HarnessContext`] is built per run and handed to every scenario. It
//! replaces the process-global settings and "current debugger" the scenarios
//! would otherwise share.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::common::Result;
use crate::coordinator::Coordinator;
use crate::fred::DebuggerLauncher;

use super::oracle::Oracle;
use super::session::{Session, SessionManager, SessionOptions, SessionState};

/// Settings fixed for the whole run
#[derive(Debug, Clone)]
pub struct Settings {
    pub coordinator_port: u16,
    pub debug: bool,
    pub show_child_output: bool,
    /// Debugger wrapped by the front-end, e.g. `gdb`
    pub debugger: String,
    /// Directory holding the test programs
    pub test_programs: PathBuf,
    pub directive_timeout: Duration,
}

impl Settings {
    /// Command line debugging `target` with the default debugger
    pub fn command_line(&self, debugger: Option<&str>, target: &str) -> Vec<String> {
        vec![
            debugger.unwrap_or(&self.debugger).to_string(),
            self.test_programs.join(target).display().to_string(),
        ]
    }
}

pub struct HarnessContext {
    pub settings: Settings,
    pub sessions: SessionManager,
    pub oracle: Oracle,
}

impl HarnessContext {
    pub fn new(
        settings: Settings,
        coordinator: Arc<dyn Coordinator>,
        launcher: Arc<dyn DebuggerLauncher>,
    ) -> Self {
        let sessions = SessionManager::new(coordinator, launcher, settings.directive_timeout);
        Self {
            settings,
            sessions,
            oracle: Oracle::new(),
        }
    }

    pub async fn start_session(&mut self, command_line: Vec<String>) -> Result<&mut Session> {
        let options = SessionOptions {
            coordinator_port: self.settings.coordinator_port,
            debug: self.settings.debug,
            show_output: self.settings.show_child_output,
        };
        self.sessions.start(command_line, options).await
    }

    pub async fn end_session(&mut self) -> Result<()> {
        self.sessions.end().await
    }

    pub fn session_state(&self) -> SessionState {
        self.sessions.state()
    }

    /// The active session together with the oracle
    pub fn active(&mut self) -> Result<(&mut Session, &mut Oracle)> {
        let session = self.sessions.active_mut()?;
        Ok((session, &mut self.oracle))
    }
}
