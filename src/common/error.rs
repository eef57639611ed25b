//! Error types for the FReD test harness
//!
//! Only the pre-flight errors are fatal for a whole run. Everything raised
//! while a scenario iteration is executing is turned into a failed verdict by
//! the runner, so messages are written to read well inside a result table.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Pre-flight Errors ===
    #[error("Required binary '{name}' not found. Searched: {searched}")]
    MissingBinary { name: String, searched: String },

    // === Coordinator Errors ===
    #[error("Checkpoint coordinator failed to start on port {0}")]
    CoordinatorStartFailed(u16),

    #[error("Coordinator command '{action}' failed: {message}")]
    CoordinatorCommand { action: String, message: String },

    #[error("No free port available for the checkpoint coordinator: {0}")]
    NoFreePort(#[source] io::Error),

    // === Session Errors ===
    #[error("No debugger session active")]
    SessionNotActive,

    #[error("Debugger session already active. The previous session must be ended first")]
    SessionAlreadyActive,

    #[error("Debugger failed to start: {0}")]
    DebuggerStartFailed(String),

    #[error("Debugger exited unexpectedly")]
    DebuggerExited,

    #[error("Session teardown incomplete: {0}")]
    Teardown(String),

    // === Directive Errors ===
    #[error("Invalid directive '{text}': {reason}")]
    InvalidDirective { text: String, reason: String },

    #[error("Invalid breakpoint location: {0}")]
    InvalidLocation(String),

    #[error("Cannot restart from checkpoint {index}: only {taken} taken in this session")]
    CheckpointOutOfRange { index: usize, taken: usize },

    #[error("Debugger rejected '{directive}': {message}")]
    DirectiveRejected { directive: String, message: String },

    // === Oracle Errors ===
    #[error("Cannot evaluate '{expr}': {message}")]
    Evaluate { expr: String, message: String },

    #[error("No stored value for '{0}'")]
    OracleMissing(String),

    #[error("Value of '{expr}' is not numeric: {value}")]
    NotNumeric { expr: String, value: String },

    #[error("No source position available: {0}")]
    NoSourcePosition(String),

    // === Timeout Errors ===
    #[error("Debugger did not respond within {0} seconds")]
    Timeout(u64),

    // === Configuration Errors ===
    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Invalid scenario '{name}': {reason}")]
    InvalidScenario { name: String, reason: String },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a missing binary error with search locations
    pub fn missing_binary<S: AsRef<str>>(name: &str, paths: &[S]) -> Self {
        Self::MissingBinary {
            name: name.to_string(),
            searched: paths.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join(", "),
        }
    }

    /// Create an invalid directive error
    pub fn invalid_directive(text: &str, reason: &str) -> Self {
        Self::InvalidDirective {
            text: text.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid scenario error
    pub fn invalid_scenario(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidScenario {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a coordinator command error
    pub fn coordinator(action: &str, message: impl Into<String>) -> Self {
        Self::CoordinatorCommand {
            action: action.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_lists_search_paths() {
        let err = Error::missing_binary("dmtcp_command", &["PATH", "/usr/local/bin"]);
        assert_eq!(
            err.to_string(),
            "Required binary 'dmtcp_command' not found. Searched: PATH, /usr/local/bin"
        );
    }
}
