//! Values and positions read back from the debugger
//!
//! FReD forwards gdb's console output verbatim, so these parsers work on the
//! text gdb prints for `print`, `where` and stop notifications.

use serde::Serialize;
use std::fmt;

use crate::common::{Error, Result};

/// A value printed by the debugger, normalized to trimmed text
///
/// Equality is textual: replay fidelity means the debugger prints the same
/// thing after a restart as it did when the value was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Value(String);

impl Value {
    pub fn new(text: impl AsRef<str>) -> Self {
        Self(text.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric reading of the value
    ///
    /// gdb appends a character rendering to `char` values (`97 'a'`), so only
    /// the leading token is parsed.
    pub fn as_i64(&self) -> Option<i64> {
        self.0.split_whitespace().next()?.parse().ok()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source position of the innermost frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Position {
    pub function: Option<String>,
    pub file: Option<String>,
    pub line: u32,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.function, &self.file) {
            (Some(func), Some(file)) => write!(f, "{} at {}:{}", func, file, self.line),
            (None, Some(file)) => write!(f, "{}:{}", file, self.line),
            (Some(func), None) => write!(f, "{} line {}", func, self.line),
            (None, None) => write!(f, "line {}", self.line),
        }
    }
}

/// Markers gdb and FReD print when a command did not do what was asked
const ERROR_MARKERS: &[&str] = &[
    "Undefined command",
    "No symbol",
    "No breakpoint number",
    "The program is not being run",
    "Cannot access memory",
    "No checkpoint",
    "ERROR:",
];

/// First line of a reply carrying an error marker, if any
pub fn find_error(output: &str) -> Option<&str> {
    output
        .lines()
        .map(str::trim)
        .find(|line| ERROR_MARKERS.iter().any(|marker| line.contains(marker)))
}

/// Parse the reply to `print <expr>` (`$1 = 42`)
pub fn parse_print_output(expr: &str, output: &str) -> Result<Value> {
    let start = output
        .lines()
        .position(|line| is_history_assignment(line.trim_start()));

    let Some(start) = start else {
        let message = find_error(output).unwrap_or(output.trim());
        return Err(Error::Evaluate {
            expr: expr.to_string(),
            message: message.to_string(),
        });
    };

    // Aggregates may span several lines; keep everything after the first `=`.
    let text: Vec<&str> = output.lines().skip(start).collect();
    let joined = text.join("\n");
    let value = joined
        .split_once(" = ")
        .map(|(_, v)| v)
        .unwrap_or_default();
    Ok(Value::new(value))
}

fn is_history_assignment(line: &str) -> bool {
    let Some(rest) = line.strip_prefix('$') else {
        return false;
    };
    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && rest[digits..].starts_with(" = ")
}

/// Parse the innermost frame from `where` output
///
/// Handles frames wrapped onto a continuation line:
/// ```text
/// #0  list_len (head=0x602010)
///     at test-list.c:22
/// ```
pub fn parse_frame(output: &str) -> Result<Position> {
    let mut frame = String::new();
    let mut in_frame = false;
    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("#0") {
            in_frame = true;
        } else if in_frame && trimmed.starts_with('#') {
            break;
        }
        if in_frame {
            if !frame.is_empty() {
                frame.push(' ');
            }
            frame.push_str(trimmed);
        }
    }

    if frame.is_empty() {
        return Err(Error::NoSourcePosition(output.trim().to_string()));
    }

    let (head, location) = frame
        .rsplit_once(" at ")
        .ok_or_else(|| Error::NoSourcePosition(frame.clone()))?;
    let (file, line) = location
        .trim()
        .rsplit_once(':')
        .ok_or_else(|| Error::NoSourcePosition(frame.clone()))?;
    let line: u32 = line
        .trim()
        .parse()
        .map_err(|_| Error::NoSourcePosition(frame.clone()))?;

    Ok(Position {
        function: frame_function(head),
        file: Some(file.to_string()),
        line,
    })
}

/// Function name from `#0  0x0000 in name (args)` or `#0  name (args)`
fn frame_function(head: &str) -> Option<String> {
    let head = head.trim_start_matches('#').trim_start_matches(|c: char| c.is_ascii_digit());
    let head = match head.split_once(" in ") {
        Some((_, rest)) => rest,
        None => head,
    };
    head.split_whitespace()
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Whether a stop notification reports a breakpoint hit
///
/// gdb prints `Breakpoint 2, print_solution () at ...` for the current thread
/// and `Thread 3 "worker" hit Breakpoint 2, ...` for others.
pub fn stopped_at_breakpoint(output: &str) -> bool {
    output.lines().map(str::trim).any(|line| {
        let rest = line
            .strip_prefix("Breakpoint ")
            .or_else(|| line.split_once("hit Breakpoint ").map(|(_, r)| r));
        match rest {
            Some(rest) => {
                let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
                digits > 0 && rest[digits..].starts_with(',')
            }
            None => false,
        }
    })
}
