//! DMTCP coordinator adapter
//!
//! Drives `dmtcp_coordinator` and `dmtcp_command`. Every call is a short-lived
//! child process; the coordinator itself daemonizes.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::common::config::PathsConfig;
use crate::common::{with_timeout, Error, Result};

use super::Coordinator;

/// Coordinator backed by the DMTCP command-line tools
pub struct DmtcpCoordinator {
    coordinator_bin: PathBuf,
    command_bin: PathBuf,
    port: AtomicU16,
    timeout: Duration,
}

impl DmtcpCoordinator {
    /// Create an adapter for the coordinator on `port` (0 until started)
    pub fn new(paths: &PathsConfig, port: u16, timeout: Duration) -> Self {
        Self {
            coordinator_bin: paths.dmtcp_coordinator.clone(),
            command_bin: paths.dmtcp_command.clone(),
            port: AtomicU16::new(port),
            timeout,
        }
    }

    fn port(&self) -> u16 {
        self.port.load(Ordering::SeqCst)
    }

    /// Run `dmtcp_command -p PORT <flag>` and return its stdout
    async fn command(&self, port: u16, flag: &str) -> Result<String> {
        let mut cmd = Command::new(&self.command_bin);
        cmd.arg("-p")
            .arg(port.to_string())
            .arg(flag)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = with_timeout(self.timeout, async {
            cmd.output().await.map_err(|e| {
                Error::coordinator(
                    flag,
                    format!("failed to run {}: {}", self.command_bin.display(), e),
                )
            })
        })
        .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::coordinator(
                flag,
                format!("exit status {:?}: {}", output.status.code(), stderr.trim()),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Coordinator for DmtcpCoordinator {
    async fn start(&self, port: u16) -> Result<bool> {
        self.port.store(port, Ordering::SeqCst);

        let mut cmd = Command::new(&self.coordinator_bin);
        cmd.arg("--daemon")
            .arg("-p")
            .arg(port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let status = with_timeout(self.timeout, async {
            cmd.status().await.map_err(|e| {
                Error::coordinator(
                    "start",
                    format!("failed to run {}: {}", self.coordinator_bin.display(), e),
                )
            })
        })
        .await?;

        if !status.success() {
            tracing::error!(port, code = ?status.code(), "dmtcp_coordinator exited with failure");
            return Ok(false);
        }

        Ok(self.is_running().await)
    }

    async fn is_running(&self) -> bool {
        match self.command(self.port(), "-s").await {
            Ok(status) => {
                if let Some(peers) = parse_num_peers(&status) {
                    tracing::debug!(port = self.port(), peers, "Coordinator status");
                }
                true
            }
            Err(e) => {
                tracing::debug!(port = self.port(), error = %e, "Coordinator not reachable");
                false
            }
        }
    }

    async fn kill_peers(&self) -> Result<()> {
        tracing::debug!(port = self.port(), "Killing coordinator peers");
        self.command(self.port(), "-k").await.map(|_| ())
    }

    async fn kill_coordinator(&self, port: u16) -> Result<()> {
        self.command(port, "-q").await.map(|_| ())
    }
}

/// Extract `NUM_PEERS=<n>` from `dmtcp_command --status` output
pub fn parse_num_peers(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.trim().strip_prefix("NUM_PEERS="))
        .and_then(|n| n.trim().parse().ok())
}
