//! Harness run flow
//!
//! Loads configuration and scenarios, checks the environment, brings up the
//! coordinator and runs the selected scenarios. Global cleanup runs however
//! the suite ends: normally, with a panic, or on Ctrl-C.

use std::future::Future;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;

use crate::commands::Cli;
use crate::common::config::Config;
use crate::common::Result;
use crate::coordinator::{Coordinator, CoordinatorHandle, DmtcpCoordinator};
use crate::fred::{DebuggerLauncher, FredLauncher};
use crate::harness::{HarnessContext, Settings};
use crate::setup;
use crate::testing::{self, Dispatch, Registry, Reporter, TestResult};

/// What a finished suite produced
#[derive(Debug, Default)]
pub struct SuiteSummary {
    pub results: Vec<TestResult>,
    pub skipped: Vec<String>,
}

impl SuiteSummary {
    pub fn all_passed(&self) -> bool {
        self.skipped.is_empty() && self.results.iter().all(TestResult::passed)
    }
}

/// Run the harness, returning the process exit code
pub async fn run(args: Cli) -> Result<i32> {
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let scenarios_dir = args.scenarios.as_deref().or(config.paths.scenarios.as_deref());
    let registry = load_registry(scenarios_dir)?;

    if args.list_tests {
        println!("Available tests:");
        for name in registry.names() {
            println!("{}", name);
        }
        return Ok(1);
    }

    let paths = setup::preflight(&config.paths)?;

    let coordinator: Arc<dyn Coordinator> = Arc::new(DmtcpCoordinator::new(
        &paths,
        args.port.unwrap_or(0),
        config.timeouts.startup(),
    ));
    let launcher: Arc<dyn DebuggerLauncher> = Arc::new(FredLauncher::new(
        paths.fred.clone(),
        config.fred.prompt.clone(),
        config.timeouts.clone(),
    ));

    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    run_with(&args, &config, registry, coordinator, launcher, interrupt).await
}

/// Run the selected scenarios against the given collaborators
///
/// The suite runs in its own task. Whether it finishes, panics or is
/// interrupted, the task is joined before the coordinator's peers are killed
/// and an owned coordinator is stopped.
pub async fn run_with(
    args: &Cli,
    config: &Config,
    registry: Registry,
    coordinator: Arc<dyn Coordinator>,
    launcher: Arc<dyn DebuggerLauncher>,
    interrupt: impl Future<Output = ()>,
) -> Result<i32> {
    let handle = CoordinatorHandle::acquire(coordinator, args.port).await?;

    let settings = Settings {
        coordinator_port: handle.port(),
        debug: args.enable_debug,
        show_child_output: args.show_child_output,
        debugger: config.paths.debugger.clone(),
        test_programs: config.paths.test_programs.clone(),
        directive_timeout: config.timeouts.directive(),
    };
    let ctx = HarnessContext::new(settings, handle.coordinator(), launcher);

    let plan = registry.plan(&args.selection());
    let color = std::io::stdout().is_terminal();

    let mut suite = tokio::spawn(run_suite(ctx, registry, plan, args.iters, color));

    let joined = tokio::select! {
        joined = &mut suite => Some(joined),
        _ = interrupt => None,
    };

    let summary = match joined {
        Some(Ok(summary)) => Some(summary),
        Some(Err(e)) if e.is_panic() => {
            tracing::error!(panic = %panic_message(e.into_panic()), "Test suite panicked");
            None
        }
        Some(Err(e)) => {
            tracing::error!(error = %e, "Test suite task failed");
            None
        }
        None => {
            tracing::warn!("Interrupted, cleaning up");
            suite.abort();
            // The cancelled task drops the live session, killing the front-end.
            let _ = suite.await;
            None
        }
    };

    handle.shutdown().await;

    let Some(summary) = summary else {
        return Ok(1);
    };

    if let Some(path) = &args.report {
        testing::write_json(path, &summary.results, &summary.skipped)?;
    }

    Ok(if summary.all_passed() { 0 } else { 1 })
}

/// Built-in scenarios plus any found in `dir`
pub fn load_registry(dir: Option<&Path>) -> Result<Registry> {
    let mut registry = Registry::builtin()?;
    if let Some(dir) = dir {
        registry.load_dir(dir)?;
    }
    Ok(registry)
}

/// Run every planned name in order, printing the result table to stdout
pub async fn run_suite(
    mut ctx: HarnessContext,
    registry: Registry,
    plan: Vec<String>,
    iterations: usize,
    color: bool,
) -> SuiteSummary {
    let mut reporter = Reporter::new(std::io::stdout(), color);
    let mut summary = SuiteSummary::default();

    reporter.header();
    for name in &plan {
        match testing::dispatch(&mut ctx, &registry, name, iterations, &mut reporter).await {
            Dispatch::Ran(results) => summary.results.extend(results),
            Dispatch::SkippedUnknown(name) => summary.skipped.push(name),
        }
    }
    reporter.summary();

    // Normally a no-op; the runner ends every session it starts.
    if let Err(e) = ctx.end_session().await {
        tracing::warn!(error = %e, "Final session teardown failed");
    }

    summary
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Error;
    use crate::fred::{Debugger, LaunchSpec};
    use crate::harness::fakes::{events, EventLog, FakeCoordinator};
    use crate::testing::Outcome;
    use async_trait::async_trait;
    use clap::Parser;
    use std::time::Duration;

    struct PanickingLauncher;

    #[async_trait]
    impl DebuggerLauncher for PanickingLauncher {
        async fn start(&self, _spec: &LaunchSpec) -> Result<Box<dyn Debugger>> {
            panic!("front-end crashed the harness");
        }
    }

    /// Never finishes starting; logs when its pending start is dropped
    struct HangingLauncher {
        log: EventLog,
    }

    struct LogOnDrop(EventLog);

    impl Drop for LogOnDrop {
        fn drop(&mut self) {
            self.0.lock().unwrap().push("start cancelled".to_string());
        }
    }

    #[async_trait]
    impl DebuggerLauncher for HangingLauncher {
        async fn start(&self, _spec: &LaunchSpec) -> Result<Box<dyn Debugger>> {
            let _guard = LogOnDrop(Arc::clone(&self.log));
            std::future::pending::<()>().await;
            Err(Error::DebuggerStartFailed("unreachable".to_string()))
        }
    }

    fn coordinator_port(log: &EventLog) -> String {
        let first = events(log).into_iter().next().unwrap();
        first.strip_prefix("coordinator start ").unwrap().to_string()
    }

    #[tokio::test]
    async fn test_panicking_suite_still_cleans_up_coordinator() {
        let coordinator = Arc::new(FakeCoordinator::default());
        let log = Arc::clone(&coordinator.log);
        let args = Cli::parse_from(["fredtest", "-t", "gdb-reverse-step"]);

        let code = run_with(
            &args,
            &Config::default(),
            Registry::builtin().unwrap(),
            coordinator,
            Arc::new(PanickingLauncher),
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(code, 1);
        let port = coordinator_port(&log);
        assert_eq!(
            events(&log),
            vec![
                format!("coordinator start {}", port),
                "kill_peers".to_string(),
                format!("kill_coordinator {}", port),
            ]
        );
    }

    #[tokio::test]
    async fn test_interrupt_joins_suite_before_cleanup() {
        let coordinator = Arc::new(FakeCoordinator::default());
        let log = Arc::clone(&coordinator.log);
        let launcher = Arc::new(HangingLauncher {
            log: Arc::clone(&log),
        });
        let args = Cli::parse_from(["fredtest", "-t", "gdb-reverse-step"]);

        let code = run_with(
            &args,
            &Config::default(),
            Registry::builtin().unwrap(),
            coordinator,
            launcher,
            tokio::time::sleep(Duration::from_millis(50)),
        )
        .await
        .unwrap();

        assert_eq!(code, 1);
        let port = coordinator_port(&log);
        assert_eq!(
            events(&log),
            vec![
                format!("coordinator start {}", port),
                "start cancelled".to_string(),
                "kill_peers".to_string(),
                format!("kill_coordinator {}", port),
            ]
        );
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new("kaboom".to_string())), "kaboom");
        assert_eq!(panic_message(Box::new(42)), "unknown panic");
    }

    #[test]
    fn test_summary_requires_no_skips() {
        let mut summary = SuiteSummary::default();
        assert!(summary.all_passed());

        summary.results.push(TestResult {
            name: "gdb-reverse-step".to_string(),
            title: "gdb reverse step".to_string(),
            iteration: 0,
            outcome: Outcome::Passed,
        });
        assert!(summary.all_passed());

        summary.skipped.push("nonexistent-test".to_string());
        assert!(!summary.all_passed());
    }

    #[test]
    fn test_load_registry_without_dir() {
        let registry = load_registry(None).unwrap();
        assert_eq!(registry.len(), testing::INTEGRATION_SUITE.len());
    }
}
