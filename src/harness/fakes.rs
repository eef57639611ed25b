//! In-memory collaborators for unit tests
//!
//! The fake program is a counter `t`: `run` sets it to 0, `next N`/`step N`
//! add N, `continue` adds 10 and reports a breakpoint hit, checkpoints record
//! `t`, and reverse steps subtract 1. `print t` shows the counter and the
//! current line is always `100 + t`.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::common::{Error, Result};
use crate::coordinator::Coordinator;
use crate::fred::{Debugger, DebuggerLauncher, LaunchSpec, Position, Value};
use crate::harness::script::Directive;

pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn events(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[derive(Default)]
pub struct FakeCoordinator {
    pub log: EventLog,
    pub fail_kill_peers: bool,
}

#[async_trait]
impl Coordinator for FakeCoordinator {
    async fn start(&self, port: u16) -> Result<bool> {
        self.log.lock().unwrap().push(format!("coordinator start {}", port));
        Ok(true)
    }

    async fn is_running(&self) -> bool {
        true
    }

    async fn kill_peers(&self) -> Result<()> {
        self.log.lock().unwrap().push("kill_peers".to_string());
        if self.fail_kill_peers {
            return Err(Error::coordinator("-k", "connection refused"));
        }
        Ok(())
    }

    async fn kill_coordinator(&self, port: u16) -> Result<()> {
        self.log.lock().unwrap().push(format!("kill_coordinator {}", port));
        Ok(())
    }
}

/// Launches [`FakeDebugger`]s, numbering sessions from 1
#[derive(Default)]
pub struct FakeLauncher {
    pub log: EventLog,
    pub fail_start: bool,
    pub fail_destroy: bool,
    /// Sessions whose restarts land one step after the checkpoint
    pub drifting_sessions: HashSet<u64>,
    pub(crate) started: Mutex<u64>,
}

#[async_trait]
impl DebuggerLauncher for FakeLauncher {
    async fn start(&self, spec: &LaunchSpec) -> Result<Box<dyn Debugger>> {
        let number = {
            let mut started = self.started.lock().unwrap();
            *started += 1;
            *started
        };
        self.log
            .lock()
            .unwrap()
            .push(format!("start {}", spec.command_line.join(" ")));
        if self.fail_start {
            return Err(Error::DebuggerStartFailed("fake refused".to_string()));
        }
        Ok(Box::new(FakeDebugger {
            log: Arc::clone(&self.log),
            t: 0,
            checkpoints: Vec::new(),
            at_breakpoint: false,
            drift: self.drifting_sessions.contains(&number),
            fail_destroy: self.fail_destroy,
        }))
    }
}

pub struct FakeDebugger {
    log: EventLog,
    t: i64,
    checkpoints: Vec<i64>,
    at_breakpoint: bool,
    drift: bool,
    fail_destroy: bool,
}

#[async_trait]
impl Debugger for FakeDebugger {
    async fn execute(&mut self, directive: &Directive) -> Result<()> {
        self.log.lock().unwrap().push(directive.to_string());
        self.at_breakpoint = false;
        match directive {
            Directive::Run => self.t = 0,
            Directive::Next { count } | Directive::Step { count } => self.t += i64::from(*count),
            Directive::Continue { .. } => {
                self.t += 10;
                self.at_breakpoint = true;
            }
            Directive::Checkpoint => self.checkpoints.push(self.t),
            Directive::Restart { index } => {
                let index = index.ok_or_else(|| Error::Internal("unresolved restart".to_string()))?;
                self.t = self.checkpoints[index] + i64::from(self.drift);
            }
            Directive::ReverseStep | Directive::ReverseNext => self.t -= 1,
            Directive::ReverseContinue => {
                self.t -= 10;
                self.at_breakpoint = true;
            }
            Directive::ReverseFinish => self.t = 0,
            Directive::ReverseWatch(_) | Directive::Break(_) | Directive::Delete(_) => {}
            Directive::Print(_) => {}
        }
        Ok(())
    }

    async fn evaluate(&mut self, expr: &str) -> Result<Value> {
        match expr {
            "t" => Ok(Value::new(self.t.to_string())),
            "name" => Ok(Value::new("\"fake\"")),
            _ => Err(Error::Evaluate {
                expr: expr.to_string(),
                message: format!("No symbol \"{}\" in current context.", expr),
            }),
        }
    }

    async fn current_position(&mut self) -> Result<Position> {
        Ok(Position {
            function: Some("main".to_string()),
            file: Some("fake.c".to_string()),
            line: (100 + self.t) as u32,
        })
    }

    async fn at_breakpoint(&mut self) -> Result<bool> {
        Ok(self.at_breakpoint)
    }

    async fn destroy(self: Box<Self>) -> Result<()> {
        self.log.lock().unwrap().push("destroy".to_string());
        if self.fail_destroy {
            return Err(Error::Internal("fake destroy failed".to_string()));
        }
        Ok(())
    }
}
