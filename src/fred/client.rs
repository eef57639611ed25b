//! FReD front-end client
//!
//! Spawns the front-end wrapping the real debugger and talks to it over
//! stdin/stdout, one command and one prompt-terminated reply at a time.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::BufWriter;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::common::config::Timeouts;
use crate::common::{with_timeout, Error, Result};
use crate::harness::script::Directive;

use super::codec::{self, PromptReader};
use super::types::{self, Position, Value};
use super::{Debugger, DebuggerLauncher, LaunchSpec};

/// Launches FReD front-end sessions
#[derive(Debug, Clone)]
pub struct FredLauncher {
    fred_path: PathBuf,
    prompt: String,
    timeouts: Timeouts,
}

impl FredLauncher {
    pub fn new(fred_path: impl Into<PathBuf>, prompt: impl Into<String>, timeouts: Timeouts) -> Self {
        Self {
            fred_path: fred_path.into(),
            prompt: prompt.into(),
            timeouts,
        }
    }
}

#[async_trait]
impl DebuggerLauncher for FredLauncher {
    async fn start(&self, spec: &LaunchSpec) -> Result<Box<dyn Debugger>> {
        let client = FredClient::spawn(&self.fred_path, &self.prompt, &self.timeouts, spec).await?;
        Ok(Box::new(client))
    }
}

/// Client for one FReD front-end process
pub struct FredClient {
    /// Front-end subprocess
    child: Child,
    /// Prompt-framed reader over the front-end's stdout
    reader: PromptReader<ChildStdout>,
    /// Buffered writer for the front-end's stdin
    writer: BufWriter<ChildStdin>,
    /// Reply to the last directive that moved execution
    last_stop: Option<String>,
    /// Log transcripts at info instead of trace
    show_output: bool,
    teardown_timeout: Duration,
}

impl FredClient {
    /// Spawn the front-end and wait for its first prompt
    pub async fn spawn(
        fred_path: &Path,
        prompt: &str,
        timeouts: &Timeouts,
        spec: &LaunchSpec,
    ) -> Result<Self> {
        if spec.command_line.is_empty() {
            return Err(Error::DebuggerStartFailed("empty command line".to_string()));
        }

        let port = spec.coordinator_port.to_string();
        let mut cmd = Command::new(fred_path);
        cmd.arg("-p").arg(&port);
        if spec.debug {
            cmd.arg("--enable-debug");
        }
        cmd.args(&spec.command_line)
            .env("DMTCP_PORT", &port)
            .env("DMTCP_COORD_PORT", &port)
            .env("DMTCP_CHECKPOINT_DIR", &spec.checkpoint_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(if spec.show_output {
                Stdio::inherit()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        // Own process group so teardown can take the debugger and anything it
        // forked down together.
        #[cfg(unix)]
        cmd.process_group(0);

        tracing::debug!(
            fred = %fred_path.display(),
            command_line = ?spec.command_line,
            port = spec.coordinator_port,
            "Spawning FReD front-end"
        );

        let mut child = cmd.spawn().map_err(|e| {
            Error::DebuggerStartFailed(format!("Failed to start {}: {}", fred_path.display(), e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::DebuggerStartFailed("Failed to get front-end stdin".to_string()))?;
        let stdout = child.stdout.take().ok_or_else(|| {
            Error::DebuggerStartFailed("Failed to get front-end stdout".to_string())
        })?;

        let mut client = Self {
            child,
            reader: PromptReader::new(stdout, prompt),
            writer: BufWriter::new(stdin),
            last_stop: None,
            show_output: spec.show_output,
            teardown_timeout: timeouts.teardown(),
        };

        match with_timeout(timeouts.startup(), client.reader.read_reply()).await {
            Ok(banner) => {
                client.log_transcript("<startup>", &banner);
                Ok(client)
            }
            Err(e) => {
                kill_group(client.child.id());
                let _ = client.child.kill().await;
                Err(Error::DebuggerStartFailed(format!(
                    "front-end never became ready: {}",
                    e
                )))
            }
        }
    }

    /// Send one command line and wait for the reply
    async fn request(&mut self, command: &str) -> Result<String> {
        codec::write_command(&mut self.writer, command).await?;
        let reply = self.reader.read_reply().await?;
        self.log_transcript(command, &reply);
        Ok(reply)
    }

    fn log_transcript(&self, command: &str, reply: &str) {
        if self.show_output {
            tracing::info!(target: "fredtest::child", command, "{}", reply.trim_end());
        } else {
            tracing::trace!(target: "fredtest::child", command, "{}", reply.trim_end());
        }
    }
}

/// SIGKILL the process group led by the front-end with id `pgid`
///
/// The id must be read before the front-end is reaped; tokio forgets it once
/// the child has been waited on.
fn kill_group(pgid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pgid) = pgid {
        // SAFETY: signalling a process group we created; an empty group only
        // yields ESRCH.
        unsafe {
            libc::killpg(pgid as libc::pid_t, libc::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    let _ = pgid;
}

/// Directives after which the debugger reports a new stop
fn moves_execution(directive: &Directive) -> bool {
    !matches!(
        directive,
        Directive::Break(_) | Directive::Delete(_) | Directive::Print(_) | Directive::Checkpoint
    )
}

#[async_trait]
impl Debugger for FredClient {
    async fn execute(&mut self, directive: &Directive) -> Result<()> {
        let command = directive.to_string();
        let reply = self.request(&command).await?;

        if let Some(message) = types::find_error(&reply) {
            return Err(Error::DirectiveRejected {
                directive: command,
                message: message.to_string(),
            });
        }

        if moves_execution(directive) {
            self.last_stop = Some(reply);
        }
        Ok(())
    }

    async fn evaluate(&mut self, expr: &str) -> Result<Value> {
        let reply = self.request(&format!("print {}", expr)).await?;
        types::parse_print_output(expr, &reply)
    }

    async fn current_position(&mut self) -> Result<Position> {
        let reply = self.request("where 1").await?;
        types::parse_frame(&reply)
    }

    async fn at_breakpoint(&mut self) -> Result<bool> {
        Ok(self
            .last_stop
            .as_deref()
            .map(types::stopped_at_breakpoint)
            .unwrap_or(false))
    }

    async fn destroy(self: Box<Self>) -> Result<()> {
        let FredClient {
            mut child,
            mut writer,
            teardown_timeout,
            ..
        } = *self;
        let pgid = child.id();

        // gdb asks for confirmation while an inferior is alive.
        let _ = codec::write_command(&mut writer, "quit").await;
        let _ = codec::write_command(&mut writer, "y").await;
        drop(writer);

        match tokio::time::timeout(teardown_timeout, child.wait()).await {
            Ok(Ok(status)) => tracing::debug!(?status, "FReD front-end exited"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Failed to wait for FReD front-end"),
            Err(_) => tracing::warn!("FReD front-end ignored quit, killing it"),
        }

        // Reap anything left in the session's process group either way.
        kill_group(pgid);
        if child.try_wait()?.is_none() {
            child.kill().await?;
        }
        Ok(())
    }
}
