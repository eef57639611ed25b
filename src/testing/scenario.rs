//! Scenario descriptors
//!
//! A scenario is a target program plus one or more phases. Each phase runs in
//! its own debugger session: start, steps in order, end. Scenarios are plain
//! YAML data:
//!
//! ```yaml
//! name: gdb-record-replay-pthread-cond
//! title: gdb record/replay pthread_cond
//! target: pthread-cond-var
//! phases:
//!   - steps:
//!       - action: script
//!         commands: [b main, b print_solution, r, fred-ckpt, c]
//!       - action: store
//!         expr: solution
//!       - action: script
//!         commands: [fred-restart, c]
//!       - action: check_stored
//!         expr: solution
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Deserializer};

use crate::common::{Error, Result};
use crate::harness::{CommandScript, Directive, Predicate};

/// A complete scenario
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Registry key, e.g. `gdb-reverse-step`
    pub name: String,
    /// Row label in the result table; defaults to the name
    pub title: Option<String>,
    /// Program under test, relative to the test programs directory
    pub target: String,
    /// Debugger to wrap instead of the configured one
    pub debugger: Option<String>,
    pub description: Option<String>,
    pub phases: Vec<Phase>,
}

/// One session's worth of steps
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Phase {
    /// Reported when only this phase fails
    pub label: Option<String>,
    pub steps: Vec<Step>,
}

/// A single step of a phase
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Deliver debugger directives
    Script { commands: CommandScript },
    /// Record the current value of an expression
    Store { expr: String, key: Option<String> },
    /// Compare an expression with its recorded value
    CheckStored { expr: String, key: Option<String> },
    /// Compare an expression with a literal
    CheckValue {
        expr: String,
        #[serde(deserialize_with = "scalar_text")]
        equals: String,
    },
    /// Evaluate a numeric predicate, e.g. `solution < 100`
    CheckHolds { predicate: Predicate },
    /// Current source line
    CheckLine { line: u32 },
    /// Last stop was a breakpoint hit
    CheckAtBreakpoint,
}

/// Accept `equals: 9` as well as `equals: "9"`
fn scalar_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Int(i64),
        Float(f64),
        Bool(bool),
        Text(String),
    }

    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Int(n) => n.to_string(),
        Scalar::Float(f) => f.to_string(),
        Scalar::Bool(b) => b.to_string(),
        Scalar::Text(s) => s,
    })
}

impl Scenario {
    /// Label used in the result table
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    /// Label reported when `index` is the only failing phase
    pub fn phase_label(&self, index: usize) -> String {
        self.phases
            .get(index)
            .and_then(|p| p.label.clone())
            .unwrap_or_else(|| format!("Phase {}", index + 1))
    }

    /// Reject scenarios that cannot run correctly
    ///
    /// Each phase runs in a fresh session, so checkpoint numbering restarts with
    /// it. Stored-value checks are held to the same phase: the oracle is only
    /// cleared when an iteration starts, but a value stored by an earlier phase
    /// was recorded by a different session.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() || self.name.contains(char::is_whitespace) {
            return Err(Error::invalid_scenario(&self.name, "name must be a single word"));
        }
        if self.target.trim().is_empty() {
            return Err(Error::invalid_scenario(&self.name, "missing target"));
        }
        if self.phases.is_empty() {
            return Err(Error::invalid_scenario(&self.name, "no phases"));
        }

        for (index, phase) in self.phases.iter().enumerate() {
            let label = self.phase_label(index);
            if phase.steps.is_empty() {
                return Err(Error::invalid_scenario(
                    &self.name,
                    format!("{} has no steps", label),
                ));
            }

            let mut checkpoints = 0usize;
            let mut stored: HashSet<&str> = HashSet::new();

            for step in &phase.steps {
                match step {
                    Step::Script { commands } => {
                        for directive in commands.directives() {
                            match directive {
                                Directive::Checkpoint => checkpoints += 1,
                                Directive::Restart { index: Some(i) } if *i >= checkpoints => {
                                    return Err(Error::invalid_scenario(
                                        &self.name,
                                        format!(
                                            "{}: restart from checkpoint {} before it is taken",
                                            label, i
                                        ),
                                    ));
                                }
                                Directive::Restart { index: None } if checkpoints == 0 => {
                                    return Err(Error::invalid_scenario(
                                        &self.name,
                                        format!("{}: restart before any checkpoint", label),
                                    ));
                                }
                                _ => {}
                            }
                        }
                    }
                    Step::Store { expr, key } => {
                        stored.insert(key.as_deref().unwrap_or(expr));
                    }
                    Step::CheckStored { expr, key } => {
                        let key = key.as_deref().unwrap_or(expr);
                        if !stored.contains(key) {
                            return Err(Error::invalid_scenario(
                                &self.name,
                                format!("{}: '{}' is checked before it is stored", label, key),
                            ));
                        }
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Scenario {
        serde_yaml::from_str(yaml).unwrap()
    }

    const TWO_PHASES: &str = r#"
name: gdb-record-replay
title: gdb record/replay
target: pthread-test
phases:
  - label: Ckpt at main
    steps:
      - action: script
        commands: [b main, b print_solution, r, fred-ckpt, c]
      - action: store
        expr: solution
      - action: script
        commands: [fred-restart, c]
      - action: check_stored
        expr: solution
  - label: Ckpt after thread creation
    steps:
      - action: script
        commands: [b print_checkpoint_now, r, fred-ckpt]
      - action: check_value
        expr: list_len(head)
        equals: 9
      - action: check_holds
        predicate: solution < 100
      - action: check_line
        line: 41
      - action: check_at_breakpoint
"#;

    #[test]
    fn test_parse_scenario() {
        let scenario = parse(TWO_PHASES);
        assert_eq!(scenario.title(), "gdb record/replay");
        assert_eq!(scenario.phases.len(), 2);
        assert_eq!(scenario.phase_label(1), "Ckpt after thread creation");
        assert!(matches!(
            &scenario.phases[0].steps[0],
            Step::Script { commands } if commands.len() == 5
        ));
        assert!(matches!(
            &scenario.phases[1].steps[1],
            Step::CheckValue { equals, .. } if equals == "9"
        ));
        assert!(matches!(
            scenario.phases[1].steps[4],
            Step::CheckAtBreakpoint
        ));
        scenario.validate().unwrap();
    }

    #[test]
    fn test_invalid_directive_fails_parsing() {
        let yaml = r#"
name: broken
target: test-list
phases:
  - steps:
      - action: script
        commands: [b main, fred-jump 3]
"#;
        assert!(serde_yaml::from_str::<Scenario>(yaml).is_err());
    }

    #[test]
    fn test_validate_rejects_early_restart() {
        let scenario = parse(
            r#"
name: early-restart
target: test-list
phases:
  - steps:
      - action: script
        commands: [b main, r, fred-ckpt, fred-restart 1]
"#,
        );
        let err = scenario.validate().unwrap_err();
        assert!(err.to_string().contains("restart from checkpoint 1"));
    }

    #[test]
    fn test_validate_rejects_unstored_check() {
        let scenario = parse(
            r#"
name: unstored
target: test-list
phases:
  - steps:
      - action: store
        expr: list_len(head)
        key: ckpt-0
  - steps:
      - action: check_stored
        expr: list_len(head)
        key: ckpt-0
"#,
        );
        let err = scenario.validate().unwrap_err();
        assert!(err.to_string().contains("'ckpt-0' is checked before it is stored"));
    }

    #[test]
    fn test_validate_numbers_checkpoints_per_phase() {
        let scenario = parse(
            r#"
name: cross-phase-restart
target: test-list
phases:
  - steps:
      - action: script
        commands: [b main, r, fred-ckpt, fred-ckpt, fred-restart 1]
  - steps:
      - action: script
        commands: [b main, r, fred-ckpt, fred-restart 1]
"#,
        );
        let err = scenario.validate().unwrap_err();
        assert!(err
            .to_string()
            .contains("restart from checkpoint 1 before it is taken"));
    }

    #[test]
    fn test_validate_rejects_empty() {
        let scenario = parse("name: empty\ntarget: test-list\nphases: []\n");
        assert!(matches!(
            scenario.validate(),
            Err(Error::InvalidScenario { .. })
        ));
    }
}
