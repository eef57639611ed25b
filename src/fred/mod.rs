//! Debugger collaborator
//!
//! The harness only needs a handful of operations from the debugger, captured
//! by [`Debugger`]. [`FredLauncher`] provides them by driving the FReD
//! front-end over its console.

pub mod client;
pub mod codec;
pub mod types;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::common::Result;
use crate::harness::script::Directive;

pub use client::{FredClient, FredLauncher};
pub use types::{Position, Value};

/// Everything needed to launch one debugger session
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Debugger command line, e.g. `["gdb", "test/pthread-test"]`
    pub command_line: Vec<String>,
    /// Port of the shared checkpoint coordinator
    pub coordinator_port: u16,
    /// Enable the debugger's own debug messages
    pub debug: bool,
    /// Let child process output through
    pub show_output: bool,
    /// Where this session's checkpoint images go
    pub checkpoint_dir: PathBuf,
}

/// A live debugger session
///
/// Every call blocks until the debugger is stopped and ready again.
#[async_trait]
pub trait Debugger: Send {
    /// Deliver one directive
    async fn execute(&mut self, directive: &Directive) -> Result<()>;

    /// Evaluate an expression in the debugged process
    async fn evaluate(&mut self, expr: &str) -> Result<Value>;

    /// Source position of the innermost frame
    async fn current_position(&mut self) -> Result<Position>;

    /// Whether the last stop was a breakpoint hit
    async fn at_breakpoint(&mut self) -> Result<bool>;

    /// Shut the debugger down
    async fn destroy(self: Box<Self>) -> Result<()>;
}

/// Starts debugger sessions
#[async_trait]
pub trait DebuggerLauncher: Send + Sync {
    async fn start(&self, spec: &LaunchSpec) -> Result<Box<dyn Debugger>>;
}
