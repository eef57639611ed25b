//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

use crate::testing::Selection;

#[derive(Parser, Debug)]
#[command(name = "fredtest", about = "Replay test harness for the FReD reverse debugger")]
#[command(version, long_about = None)]
pub struct Cli {
    /// Use PORT for the DMTCP coordinator. If unspecified, starts a background
    /// coordinator on a free port
    #[arg(short = 'p', long = "port", value_name = "PORT")]
    pub port: Option<u16>,

    /// Enable FReD debugging messages
    #[arg(long)]
    pub enable_debug: bool,

    /// Show all output from child processes
    #[arg(long)]
    pub show_child_output: bool,

    /// List available tests and exit
    #[arg(short = 'l', long)]
    pub list_tests: bool,

    /// Comma delimited list of tests to run
    #[arg(short = 't', long = "tests", value_delimiter = ',', value_name = "NAME,...")]
    pub tests: Option<Vec<String>>,

    /// Run each test N times
    #[arg(short = 'i', long = "iters", value_name = "N", default_value_t = 1)]
    pub iters: usize,

    /// Configuration file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory with additional scenario files
    #[arg(long, value_name = "DIR")]
    pub scenarios: Option<PathBuf>,

    /// Write results as JSON to PATH
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

impl Cli {
    /// Scenarios requested on the command line
    pub fn selection(&self) -> Selection {
        match &self.tests {
            Some(names) => Selection::Named(
                names
                    .iter()
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .collect(),
            ),
            None => Selection::Suite,
        }
    }
}
