//! Scenario registry and dispatch

use std::collections::BTreeMap;
use std::path::Path;

use crate::common::{Error, Result};
use crate::harness::HarnessContext;

use super::report::Reporter;
use super::runner::{run_scenario, TestResult};
use super::scenario::Scenario;

const BUILTIN: &str = include_str!("builtin.yaml");

/// The curated integration suite, in run order
pub const INTEGRATION_SUITE: &[&str] = &[
    "gdb-record-replay",
    "gdb-record-replay-mmap",
    "gdb-record-replay-past-end",
    "gdb-record-replay-pthread-cond",
    "gdb-record-replay-time",
    "gdb-reader",
    "gdb-multiple-checkpoints-record-st",
    "gdb-multiple-checkpoints-replay-st",
    "gdb-syscall-tester",
    "gdb-many-threads",
    "gdb-many-threads-2",
    "gdb-reverse-watch",
    "gdb-reverse-watch-n-rs",
    "gdb-reverse-watch-n-rn",
    "gdb-reverse-next",
    "gdb-reverse-step",
    "gdb-reverse-continue",
    "gdb-reverse-finish",
    "gdb-reverse-finish-2",
    "gdb-reverse-watch-mt",
    "gdb-reverse-watch-mt-priv",
    "gdb-reverse-watch-no-log",
];

/// Scenarios by name
#[derive(Debug, Default)]
pub struct Registry {
    scenarios: BTreeMap<String, Scenario>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in scenarios
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();
        registry.load_str(BUILTIN, "built-in scenarios")?;
        Ok(registry)
    }

    /// Validate and add a scenario; names must be unique
    pub fn insert(&mut self, scenario: Scenario) -> Result<()> {
        scenario.validate()?;
        if self.scenarios.contains_key(&scenario.name) {
            return Err(Error::invalid_scenario(
                &scenario.name,
                "duplicate scenario name",
            ));
        }
        self.scenarios.insert(scenario.name.clone(), scenario);
        Ok(())
    }

    /// Load one scenario or a list of scenarios from YAML text
    pub fn load_str(&mut self, text: &str, origin: &str) -> Result<usize> {
        let document: serde_yaml::Value = serde_yaml::from_str(text)
            .map_err(|e| Error::ConfigParse(format!("{}: {}", origin, e)))?;

        let scenarios: Vec<Scenario> = if document.is_sequence() {
            serde_yaml::from_value(document)
        } else {
            serde_yaml::from_value(document).map(|s| vec![s])
        }
        .map_err(|e| Error::ConfigParse(format!("{}: {}", origin, e)))?;

        let count = scenarios.len();
        for scenario in scenarios {
            self.insert(scenario)?;
        }
        tracing::debug!(origin, count, "Loaded scenarios");
        Ok(count)
    }

    /// Load every `*.yaml`/`*.yml` file in `dir`, in name order
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let entries = std::fs::read_dir(dir).map_err(|e| Error::FileRead {
            path: dir.display().to_string(),
            error: e.to_string(),
        })?;

        let mut files: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && matches!(
                        path.extension().and_then(|e| e.to_str()),
                        Some("yaml") | Some("yml")
                    )
            })
            .collect();
        files.sort();

        let mut count = 0;
        for path in files {
            let text = std::fs::read_to_string(&path).map_err(|e| Error::FileRead {
                path: path.display().to_string(),
                error: e.to_string(),
            })?;
            count += self.load_str(&text, &path.display().to_string())?;
        }
        tracing::info!(dir = %dir.display(), count, "Loaded scenario files");
        Ok(count)
    }

    pub fn get(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.get(name)
    }

    /// All names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scenarios.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// Names to run for a selection
    ///
    /// The full run is the integration suite followed by any scenarios loaded
    /// from files, sorted by name.
    pub fn plan(&self, selection: &Selection) -> Vec<String> {
        match selection {
            Selection::Named(names) => names.clone(),
            Selection::Suite => INTEGRATION_SUITE
                .iter()
                .filter(|name| self.scenarios.contains_key(**name))
                .map(|name| name.to_string())
                .chain(
                    self.names()
                        .filter(|name| !INTEGRATION_SUITE.iter().any(|s| s == name))
                        .map(str::to_string),
                )
                .collect(),
        }
    }
}

/// Which scenarios to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Suite,
    Named(Vec<String>),
}

/// What happened to one requested name
#[derive(Debug)]
pub enum Dispatch {
    Ran(Vec<TestResult>),
    SkippedUnknown(String),
}

/// Run a scenario by name, or report it as unknown
pub async fn dispatch<W: std::io::Write>(
    ctx: &mut HarnessContext,
    registry: &Registry,
    name: &str,
    iterations: usize,
    reporter: &mut Reporter<W>,
) -> Dispatch {
    match registry.get(name) {
        Some(scenario) => Dispatch::Ran(run_scenario(ctx, scenario, iterations, reporter).await),
        None => {
            tracing::warn!(name, "Unknown scenario");
            reporter.skipped(name);
            Dispatch::SkippedUnknown(name.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::fakes::{FakeCoordinator, FakeLauncher};
    use crate::harness::Settings;
    use crate::testing::scenario::Step;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_builtin_registry_matches_suite() {
        let registry = Registry::builtin().unwrap();
        assert_eq!(registry.len(), INTEGRATION_SUITE.len());
        for name in INTEGRATION_SUITE {
            assert!(registry.get(name).is_some(), "missing {}", name);
        }
        assert_eq!(registry.plan(&Selection::Suite), INTEGRATION_SUITE);
    }

    #[test]
    fn test_builtin_details() {
        let registry = Registry::builtin().unwrap();

        let record_replay = registry.get("gdb-record-replay").unwrap();
        assert_eq!(record_replay.title(), "gdb record/replay");
        assert_eq!(record_replay.phase_label(0), "Ckpt at main");
        assert_eq!(record_replay.phase_label(1), "Ckpt after thread creation");

        let many = registry.get("gdb-many-threads").unwrap();
        assert_eq!(many.phase_label(0), "First");
        assert_eq!(many.phase_label(1), "Mult. ckpts");

        let reverse_continue = registry.get("gdb-reverse-continue").unwrap();
        assert!(matches!(
            reverse_continue.phases[0].steps[1],
            Step::CheckAtBreakpoint
        ));

        let names: Vec<&str> = registry.names().collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut registry = Registry::builtin().unwrap();
        let yaml = r#"
name: gdb-reverse-step
target: test-list
phases:
  - steps:
      - action: script
        commands: [b main, r]
"#;
        let err = registry.load_str(yaml, "extra.yaml").unwrap_err();
        assert!(matches!(err, Error::InvalidScenario { .. }));
        assert!(err.to_string().contains("duplicate scenario name"));
    }

    #[test]
    fn test_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("b.yaml"),
            "- name: extra-two\n  target: t\n  phases:\n    - steps:\n        - action: script\n          commands: [r]\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("a.yml"),
            "name: extra-one\ntarget: t\nphases:\n  - steps:\n      - action: script\n        commands: [r]\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a scenario").unwrap();

        let mut registry = Registry::builtin().unwrap();
        assert_eq!(registry.load_dir(dir.path()).unwrap(), 2);

        let plan = registry.plan(&Selection::Suite);
        assert_eq!(plan.len(), INTEGRATION_SUITE.len() + 2);
        assert_eq!(&plan[plan.len() - 2..], ["extra-one", "extra-two"]);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let mut registry = Registry::new();
        let err = registry
            .load_str("name: x\ntarget: t\nphases: [{steps: [{action: teleport}]}]\n", "bad.yaml")
            .unwrap_err();
        assert!(matches!(err, Error::ConfigParse(ref m) if m.starts_with("bad.yaml")));
    }

    #[tokio::test]
    async fn test_dispatch_skips_unknown_and_continues() {
        let mut registry = Registry::new();
        registry
            .load_str(
                "name: fake-step\ntarget: counter\nphases:\n  - steps:\n      - action: script\n        commands: [r, n 2, fred-rs]\n      - action: check_line\n        line: 101\n",
                "inline",
            )
            .unwrap();

        let settings = Settings {
            coordinator_port: 7779,
            debug: false,
            show_child_output: false,
            debugger: "gdb".to_string(),
            test_programs: PathBuf::from("test"),
            directive_timeout: Duration::from_secs(5),
        };
        let mut ctx = HarnessContext::new(
            settings,
            Arc::new(FakeCoordinator::default()),
            Arc::new(FakeLauncher::default()),
        );

        let mut out = Vec::new();
        let mut reporter = Reporter::new(&mut out, false);
        let plan = registry.plan(&Selection::Named(vec![
            "fake-step".to_string(),
            "nonexistent-test".to_string(),
        ]));

        let mut dispatched = Vec::new();
        for name in &plan {
            dispatched.push(dispatch(&mut ctx, &registry, name, 1, &mut reporter).await);
        }
        assert!(!reporter.all_passed());
        drop(reporter);

        assert!(matches!(&dispatched[0], Dispatch::Ran(results) if results.len() == 1 && results[0].passed()));
        assert!(matches!(&dispatched[1], Dispatch::SkippedUnknown(name) if name == "nonexistent-test"));
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Unknown test 'nonexistent-test'. Skipping."));
    }
}
