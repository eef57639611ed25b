//! Result table and JSON report

use std::io::Write;
use std::path::Path;

use colored::Colorize;
use serde::Serialize;

use crate::common::{Error, Result};

use super::runner::{Outcome, TestResult};

const NAME_WIDTH: usize = 40;
const RESULT_WIDTH: usize = 15;

/// Writes the result table as results come in
///
/// Rows are flushed before a scenario finishes so a hung iteration is visible
/// while it runs. Write errors on the table are ignored; the JSON report and
/// exit status carry the results either way.
pub struct Reporter<W: Write> {
    out: W,
    color: bool,
    passed: usize,
    failed: usize,
    skipped: Vec<String>,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self {
            out,
            color,
            passed: 0,
            failed: 0,
            skipped: Vec::new(),
        }
    }

    pub fn header(&mut self) {
        let _ = writeln!(
            self.out,
            "{:<width$} | {:<rwidth$}",
            "Test name",
            "Result",
            width = NAME_WIDTH,
            rwidth = RESULT_WIDTH
        );
        let _ = writeln!(self.out, "{}+{}", "-".repeat(NAME_WIDTH + 1), "-".repeat(RESULT_WIDTH));
        let _ = self.out.flush();
    }

    pub fn begin_row(&mut self, label: &str) {
        let _ = write!(self.out, "{:<width$} | ", label, width = NAME_WIDTH);
        let _ = self.out.flush();
    }

    pub fn finish_row(&mut self, outcome: &Outcome) {
        let text = match outcome {
            Outcome::Passed => {
                self.passed += 1;
                self.paint("Passed".to_string(), true)
            }
            Outcome::Failed { reason } => {
                self.failed += 1;
                let text = match reason {
                    Some(reason) => format!("Failed: {}", reason),
                    None => "Failed".to_string(),
                };
                self.paint(text, false)
            }
        };
        let _ = writeln!(self.out, "{}", text);
        let _ = self.out.flush();
    }

    pub fn skipped(&mut self, name: &str) {
        let _ = writeln!(self.out, "Unknown test '{}'. Skipping.", name);
        let _ = self.out.flush();
        self.skipped.push(name.to_string());
    }

    pub fn summary(&mut self) {
        let line = format!(
            "{} passed, {} failed, {} skipped",
            self.passed,
            self.failed,
            self.skipped.len()
        );
        let line = if self.color {
            line.bold().to_string()
        } else {
            line
        };
        let _ = writeln!(self.out, "\n{}", line);
        let _ = self.out.flush();
    }

    /// Names that were requested but not found
    pub fn skipped_names(&self) -> &[String] {
        &self.skipped
    }

    /// Whether every executed iteration passed and nothing was skipped
    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.skipped.is_empty()
    }

    fn paint(&self, text: String, passed: bool) -> String {
        match (self.color, passed) {
            (false, _) => text,
            (true, true) => text.green().to_string(),
            (true, false) => text.red().to_string(),
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum ReportEntry<'a> {
    Result(&'a TestResult),
    Skipped { name: &'a str, status: &'static str },
}

/// Write all results as a JSON array
pub fn write_json(path: &Path, results: &[TestResult], skipped: &[String]) -> Result<()> {
    let entries: Vec<ReportEntry<'_>> = results
        .iter()
        .map(ReportEntry::Result)
        .chain(skipped.iter().map(|name| ReportEntry::Skipped {
            name,
            status: "skipped",
        }))
        .collect();

    let json = serde_json::to_string_pretty(&entries)?;
    std::fs::write(path, json).map_err(|e| Error::FileRead {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;
    tracing::info!(path = %path.display(), "Wrote JSON report");
    Ok(())
}
