//! Checkpoint coordinator lifecycle
//!
//! One coordinator is shared by every session of a run. The harness either
//! starts its own on a free port (and then owns it) or reuses one the user
//! points it at, in which case it only ever kills that coordinator's peers.

pub mod dmtcp;

use std::net::TcpListener;
use std::sync::Arc;

use async_trait::async_trait;

use crate::common::{Error, Result};

pub use dmtcp::DmtcpCoordinator;

/// Interface to the checkpoint coordinator
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Launch the coordinator bound to `port`, returning whether it came up
    async fn start(&self, port: u16) -> Result<bool>;

    /// Whether the coordinator answers on its port
    async fn is_running(&self) -> bool;

    /// Terminate every process registered with the coordinator, leaving the
    /// coordinator itself running
    async fn kill_peers(&self) -> Result<()>;

    /// Stop the coordinator process
    async fn kill_coordinator(&self, port: u16) -> Result<()>;
}

/// The run-wide coordinator plus whether this process owns it
#[derive(Clone)]
pub struct CoordinatorHandle {
    coordinator: Arc<dyn Coordinator>,
    port: u16,
    owned: bool,
}

impl CoordinatorHandle {
    /// Reuse `port` when given, otherwise start a coordinator on a free port
    pub async fn acquire(coordinator: Arc<dyn Coordinator>, port: Option<u16>) -> Result<Self> {
        if let Some(port) = port {
            tracing::info!(port, "Using external checkpoint coordinator");
            return Ok(Self {
                coordinator,
                port,
                owned: false,
            });
        }

        let port = pick_free_port()?;
        tracing::info!(port, "Starting checkpoint coordinator");
        if !coordinator.start(port).await? {
            return Err(Error::CoordinatorStartFailed(port));
        }

        Ok(Self {
            coordinator,
            port,
            owned: true,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the harness started (and must stop) this coordinator
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    pub fn coordinator(&self) -> Arc<dyn Coordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Global cleanup run once at exit, whatever state the run ended in
    pub async fn shutdown(&self) {
        if self.coordinator.is_running().await {
            if let Err(e) = self.coordinator.kill_peers().await {
                tracing::warn!(error = %e, "Failed to kill coordinator peers at exit");
            }
        }

        if self.owned {
            tracing::info!(port = self.port, "Stopping checkpoint coordinator");
            if let Err(e) = self.coordinator.kill_coordinator(self.port).await {
                tracing::warn!(error = %e, "Failed to stop checkpoint coordinator");
            }
        }
    }
}

/// Ask the OS for an unused TCP port
///
/// The listener is dropped before the coordinator binds, which leaves a short
/// window where another process could take the port; a failed start is then
/// reported as fatal like any other.
pub fn pick_free_port() -> Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0)).map_err(Error::NoFreePort)?;
    let port = listener.local_addr().map_err(Error::NoFreePort)?.port();
    Ok(port)
}
