//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Locations of external tools and test programs
    #[serde(default)]
    pub paths: PathsConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// FReD front-end settings
    #[serde(default)]
    pub fred: FredConfig,
}

/// Paths to the collaborators the harness drives
#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    /// FReD front-end executable
    #[serde(default = "default_fred")]
    pub fred: PathBuf,

    /// DMTCP coordinator executable
    #[serde(default = "default_dmtcp_coordinator")]
    pub dmtcp_coordinator: PathBuf,

    /// DMTCP control tool
    #[serde(default = "default_dmtcp_command")]
    pub dmtcp_command: PathBuf,

    /// Underlying debugger FReD wraps
    #[serde(default = "default_debugger")]
    pub debugger: String,

    /// Directory holding the compiled test programs
    #[serde(default = "default_test_programs")]
    pub test_programs: PathBuf,

    /// Optional directory with extra scenario files
    #[serde(default)]
    pub scenarios: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            fred: default_fred(),
            dmtcp_coordinator: default_dmtcp_coordinator(),
            dmtcp_command: default_dmtcp_command(),
            debugger: default_debugger(),
            test_programs: default_test_programs(),
            scenarios: None,
        }
    }
}

fn default_fred() -> PathBuf {
    PathBuf::from("fredapp.py")
}
fn default_dmtcp_coordinator() -> PathBuf {
    PathBuf::from("dmtcp_coordinator")
}
fn default_dmtcp_command() -> PathBuf {
    PathBuf::from("dmtcp_command")
}
fn default_debugger() -> String {
    "gdb".to_string()
}
fn default_test_programs() -> PathBuf {
    PathBuf::from("test")
}

/// Timeout settings in seconds
#[derive(Debug, Deserialize, Clone)]
pub struct Timeouts {
    /// Watchdog for a single directive, evaluation or position query
    #[serde(default = "default_directive")]
    pub directive_secs: u64,

    /// Time allowed for the front-end to print its first prompt
    #[serde(default = "default_startup")]
    pub startup_secs: u64,

    /// Grace period for the front-end to exit after `quit`
    #[serde(default = "default_teardown")]
    pub teardown_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            directive_secs: default_directive(),
            startup_secs: default_startup(),
            teardown_secs: default_teardown(),
        }
    }
}

fn default_directive() -> u64 {
    300
}
fn default_startup() -> u64 {
    60
}
fn default_teardown() -> u64 {
    5
}

impl Timeouts {
    pub fn directive(&self) -> Duration {
        Duration::from_secs(self.directive_secs)
    }

    pub fn startup(&self) -> Duration {
        Duration::from_secs(self.startup_secs)
    }

    pub fn teardown(&self) -> Duration {
        Duration::from_secs(self.teardown_secs)
    }
}

/// FReD front-end protocol settings
#[derive(Debug, Deserialize, Clone)]
pub struct FredConfig {
    /// Prompt printed by the front-end when it is ready for the next command
    #[serde(default = "default_prompt")]
    pub prompt: String,
}

impl Default for FredConfig {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
        }
    }
}

fn default_prompt() -> String {
    "(fred) ".to_string()
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file, which must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }
}
