//! fredtest - replay test harness for the FReD reverse debugger
//!
//! Drives the FReD front-end (gdb on top of DMTCP checkpoint/restart) through
//! scripted scenarios and checks that restarting from checkpoints and
//! reverse-executing reproduce the recorded execution exactly.

pub mod cli;
pub mod commands;
pub mod common;
pub mod coordinator;
pub mod fred;
pub mod harness;
pub mod setup;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use harness::{HarnessContext, Settings};
