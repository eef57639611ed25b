//! Scenario runner
//!
//! Runs every phase of a scenario in a fresh debugger session and combines
//! the phase verdicts into one row per iteration. Nothing raised inside an
//! iteration escapes: harness errors become failed verdicts and the session
//! is always ended before the next phase starts.

use serde::Serialize;

use crate::common::Result;
use crate::harness::{run_script, Check, HarnessContext, Oracle};

use super::report::Reporter;
use super::scenario::{Phase, Scenario, Step};

/// Verdict of one iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed { reason: Option<String> },
}

impl Outcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Result of one scenario iteration
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub name: String,
    pub title: String,
    pub iteration: usize,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl TestResult {
    pub fn passed(&self) -> bool {
        self.outcome.is_pass()
    }
}

/// Run `iterations` independent iterations of a scenario
pub async fn run_scenario<W: std::io::Write>(
    ctx: &mut HarnessContext,
    scenario: &Scenario,
    iterations: usize,
    reporter: &mut Reporter<W>,
) -> Vec<TestResult> {
    let mut results = Vec::with_capacity(iterations);

    for iteration in 0..iterations {
        reporter.begin_row(&format!("{} {}", scenario.title(), iteration));
        tracing::info!(scenario = %scenario.name, iteration, "Running scenario");

        let outcome = run_iteration(ctx, scenario).await;
        reporter.finish_row(&outcome);

        results.push(TestResult {
            name: scenario.name.clone(),
            title: scenario.title().to_string(),
            iteration,
            outcome,
        });
    }

    results
}

async fn run_iteration(ctx: &mut HarnessContext, scenario: &Scenario) -> Outcome {
    ctx.oracle.clear();

    let mut failures: Vec<(usize, String)> = Vec::new();
    for (index, phase) in scenario.phases.iter().enumerate() {
        let verdict = run_phase(ctx, scenario, phase).await;

        if let Err(e) = ctx.end_session().await {
            tracing::warn!(scenario = %scenario.name, error = %e, "Session teardown failed");
        }

        match verdict {
            Ok(check) if check.passed => {}
            Ok(check) => {
                tracing::info!(scenario = %scenario.name, phase = index, detail = %check.detail, "Check failed");
                failures.push((index, check.detail));
            }
            Err(e) => {
                tracing::error!(scenario = %scenario.name, phase = index, error = %e, "Phase aborted");
                failures.push((index, format!("error: {}", e)));
            }
        }
    }

    combine(scenario, failures)
}

/// Start a session and run the phase's steps until the first failing check
async fn run_phase(ctx: &mut HarnessContext, scenario: &Scenario, phase: &Phase) -> Result<Check> {
    let command_line = ctx
        .settings
        .command_line(scenario.debugger.as_deref(), &scenario.target);
    ctx.start_session(command_line).await?;
    let (session, oracle) = ctx.active()?;

    for step in &phase.steps {
        let check = match step {
            Step::Script { commands } => {
                run_script(session, commands).await?;
                continue;
            }
            Step::Store { expr, key } => {
                oracle.store(session, expr, key.as_deref()).await?;
                continue;
            }
            Step::CheckStored { expr, key } => {
                oracle.check_stored(session, expr, key.as_deref()).await?
            }
            Step::CheckValue { expr, equals } => Oracle::check_literal(session, expr, equals).await?,
            Step::CheckHolds { predicate } => Oracle::check_holds(session, predicate).await?,
            Step::CheckLine { line } => Oracle::check_line(session, *line).await?,
            Step::CheckAtBreakpoint => Oracle::check_at_breakpoint(session).await?,
        };

        if !check.passed {
            return Ok(check);
        }
        tracing::debug!(detail = %check.detail, "Check passed");
    }

    Ok(Check::pass("all steps completed"))
}

/// Combine phase failures into the iteration verdict
///
/// Single-phase scenarios report the failure detail. Multi-phase scenarios
/// report which phase failed, or `Both`/`All` when none passed.
fn combine(scenario: &Scenario, failures: Vec<(usize, String)>) -> Outcome {
    let phases = scenario.phases.len();

    let reason = match failures.len() {
        0 => return Outcome::Passed,
        _ if phases == 1 => failures.into_iter().next().map(|(_, detail)| detail),
        n if n == phases && phases == 2 => Some("Both".to_string()),
        n if n == phases => Some("All".to_string()),
        _ => Some(
            failures
                .iter()
                .map(|(index, _)| scenario.phase_label(*index))
                .collect::<Vec<_>>()
                .join(", "),
        ),
    };

    Outcome::Failed { reason }
}
