//! Replay oracle
//!
//! Values recorded during forward execution are compared with what the
//! debugger reports after restarting or reverse-executing. Entries are keyed
//! by expression text, or by an explicit key when the same expression is
//! recorded at several checkpoints.

use std::collections::HashMap;

use serde::Serialize;

use crate::common::{Error, Result};
use crate::fred::Value;

use super::script::Predicate;
use super::session::Session;

/// Outcome of one check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Check {
    pub passed: bool,
    pub detail: String,
}

impl Check {
    pub fn pass(detail: impl Into<String>) -> Self {
        Self {
            passed: true,
            detail: detail.into(),
        }
    }

    pub fn fail(detail: impl Into<String>) -> Self {
        Self {
            passed: false,
            detail: detail.into(),
        }
    }
}

/// Expected values recorded in the current iteration
#[derive(Debug, Default)]
pub struct Oracle {
    stored: HashMap<String, Value>,
}

impl Oracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.stored.get(key)
    }

    pub fn len(&self) -> usize {
        self.stored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stored.is_empty()
    }

    pub fn clear(&mut self) {
        self.stored.clear();
    }

    /// Evaluate `expr` and remember the result under `key` (default: `expr`)
    pub async fn store(
        &mut self,
        session: &mut Session,
        expr: &str,
        key: Option<&str>,
    ) -> Result<Value> {
        let value = session.evaluate(expr).await?;
        let key = key.unwrap_or(expr);
        tracing::debug!(key, %value, "Stored expected value");
        self.stored.insert(key.to_string(), value.clone());
        Ok(value)
    }

    /// Compare the current value of `expr` with the one stored under `key`
    pub async fn check_stored(
        &self,
        session: &mut Session,
        expr: &str,
        key: Option<&str>,
    ) -> Result<Check> {
        let key = key.unwrap_or(expr);
        let expected = self
            .stored
            .get(key)
            .ok_or_else(|| Error::OracleMissing(key.to_string()))?;
        let actual = session.evaluate(expr).await?;

        Ok(if &actual == expected {
            Check::pass(format!("{} == {}", expr, actual))
        } else {
            Check::fail(format!("{} was {}, expected {}", expr, actual, expected))
        })
    }

    /// Compare the current value of `expr` with a literal
    pub async fn check_literal(session: &mut Session, expr: &str, expected: &str) -> Result<Check> {
        let actual = session.evaluate(expr).await?;
        let expected = Value::new(expected);

        Ok(if actual == expected {
            Check::pass(format!("{} == {}", expr, actual))
        } else {
            Check::fail(format!("{} was {}, expected {}", expr, actual, expected))
        })
    }

    /// Evaluate a numeric predicate in the current state
    pub async fn check_holds(session: &mut Session, predicate: &Predicate) -> Result<Check> {
        let value = session.evaluate(&predicate.expr).await?;
        let number = value.as_i64().ok_or_else(|| Error::NotNumeric {
            expr: predicate.expr.clone(),
            value: value.to_string(),
        })?;

        Ok(if predicate.op.holds(number, predicate.value) {
            Check::pass(format!("{} ({})", predicate, number))
        } else {
            Check::fail(format!("{} is false ({} = {})", predicate, predicate.expr, number))
        })
    }

    /// Whether execution stopped on source line `expected`
    pub async fn check_line(session: &mut Session, expected: u32) -> Result<Check> {
        let position = session.current_position().await?;

        Ok(if position.line == expected {
            Check::pass(format!("at {}", position))
        } else {
            Check::fail(format!("stopped at {}, expected line {}", position, expected))
        })
    }

    /// Whether the last stop was a breakpoint hit
    pub async fn check_at_breakpoint(session: &mut Session) -> Result<Check> {
        Ok(if session.at_breakpoint().await? {
            Check::pass("stopped at breakpoint")
        } else {
            Check::fail("not stopped at a breakpoint")
        })
    }
}
