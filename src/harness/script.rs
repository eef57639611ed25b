//! Typed debugger directives
//!
//! Scripts are written in the FReD console syntax (`b main`, `fred-ckpt`,
//! `fred-restart 1`, `fred-rw list_len(head) < 10`) and parsed into a closed
//! set of directives when a scenario is built, so a typo fails scenario
//! loading instead of surfacing mid-run as a debugger error.

use serde::Deserialize;
use std::fmt;

use crate::common::{Error, Result};

/// Breakpoint location
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Function name
    Function(String),
    /// Line in the current source file
    Line(u32),
    /// File and line number
    FileLine { file: String, line: u32 },
}

impl Location {
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidLocation("empty location".to_string()));
        }
        if s.chars().all(|c| c.is_ascii_digit()) {
            let line = s
                .parse()
                .map_err(|_| Error::InvalidLocation(format!("invalid line number: {}", s)))?;
            return Ok(Self::Line(line));
        }
        if let Some((file, line)) = s.rsplit_once(':') {
            if !file.is_empty() && !line.is_empty() && line.chars().all(|c| c.is_ascii_digit()) {
                let line = line.parse().map_err(|_| {
                    Error::InvalidLocation(format!("invalid line number: {}", line))
                })?;
                return Ok(Self::FileLine {
                    file: file.to_string(),
                    line,
                });
            }
        }
        if s.contains(char::is_whitespace) {
            return Err(Error::InvalidLocation(s.to_string()));
        }
        Ok(Self::Function(s.to_string()))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function(name) => write!(f, "{}", name),
            Self::Line(line) => write!(f, "{}", line),
            Self::FileLine { file, line } => write!(f, "{}:{}", file, line),
        }
    }
}

/// Comparison operator of a predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }

    pub fn holds(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
        }
    }
}

/// Two-character operators come first so `<=` is not read as `<`.
const OPERATORS: &[CmpOp] = &[CmpOp::Le, CmpOp::Ge, CmpOp::Eq, CmpOp::Ne, CmpOp::Lt, CmpOp::Gt];

/// `<expression> <op> <integer>`, e.g. `list_len(head) < 10`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Predicate {
    pub expr: String,
    pub op: CmpOp,
    pub value: i64,
}

impl Predicate {
    pub fn parse(s: &str) -> Result<Self> {
        // The operator is the last one followed by an integer, which keeps
        // `->` inside the expression intact.
        for op in OPERATORS {
            let Some(idx) = s.rfind(op.symbol()) else {
                continue;
            };
            let expr = s[..idx].trim();
            let Ok(value) = s[idx + op.symbol().len()..].trim().parse::<i64>() else {
                continue;
            };
            if expr.is_empty() {
                break;
            }
            return Ok(Self {
                expr: expr.to_string(),
                op: *op,
                value,
            });
        }
        Err(Error::invalid_directive(
            s,
            "expected '<expression> <op> <integer>'",
        ))
    }
}

impl TryFrom<String> for Predicate {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.expr, self.op.symbol(), self.value)
    }
}

/// One debugger directive
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Directive {
    Break(Location),
    Delete(u32),
    Run,
    Checkpoint,
    /// Continue, ignoring the current breakpoint `count - 1` more times
    Continue { count: Option<u32> },
    Step { count: u32 },
    Next { count: u32 },
    Print(String),
    /// Restart from the given checkpoint, or the most recent one
    Restart { index: Option<usize> },
    ReverseStep,
    ReverseNext,
    ReverseContinue,
    ReverseFinish,
    /// Reverse execution until the predicate last held
    ReverseWatch(Predicate),
}

impl Directive {
    /// Parse a directive from FReD console syntax
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let (cmd, rest) = match text.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (text, ""),
        };

        let directive = match cmd {
            "b" | "break" => {
                if rest.is_empty() {
                    return Err(Error::invalid_directive(text, "break requires a location"));
                }
                Self::Break(Location::parse(rest)?)
            }
            "d" | "delete" => Self::Delete(parse_number(text, rest)?),
            "r" | "run" => no_args(text, rest, Self::Run)?,
            "fred-ckpt" | "fred-checkpoint" => no_args(text, rest, Self::Checkpoint)?,
            "c" | "continue" => Self::Continue {
                count: optional_number(text, rest)?,
            },
            "s" | "step" => Self::Step {
                count: optional_number(text, rest)?.unwrap_or(1),
            },
            "n" | "next" => Self::Next {
                count: optional_number(text, rest)?.unwrap_or(1),
            },
            "p" | "print" => {
                if rest.is_empty() {
                    return Err(Error::invalid_directive(text, "print requires an expression"));
                }
                Self::Print(rest.to_string())
            }
            "fred-restart" => Self::Restart {
                index: optional_number(text, rest)?,
            },
            "fred-rs" | "fred-reverse-step" => no_args(text, rest, Self::ReverseStep)?,
            "fred-rn" | "fred-reverse-next" => no_args(text, rest, Self::ReverseNext)?,
            "fred-rc" | "fred-reverse-continue" => no_args(text, rest, Self::ReverseContinue)?,
            "fred-rf" | "fred-reverse-finish" => no_args(text, rest, Self::ReverseFinish)?,
            "fred-rw" | "fred-reverse-watch" => Self::ReverseWatch(Predicate::parse(rest)?),
            "" => return Err(Error::invalid_directive(text, "empty directive")),
            _ => return Err(Error::invalid_directive(text, "unknown command")),
        };

        if matches!(
            directive,
            Self::Step { count: 0 } | Self::Next { count: 0 } | Self::Continue { count: Some(0) }
        ) {
            return Err(Error::invalid_directive(text, "count must be at least 1"));
        }

        Ok(directive)
    }

}

fn no_args(text: &str, rest: &str, directive: Directive) -> Result<Directive> {
    if rest.is_empty() {
        Ok(directive)
    } else {
        Err(Error::invalid_directive(text, "unexpected argument"))
    }
}

fn parse_number<T: std::str::FromStr>(text: &str, rest: &str) -> Result<T> {
    rest.parse()
        .map_err(|_| Error::invalid_directive(text, "expected a non-negative number"))
}

fn optional_number<T: std::str::FromStr>(text: &str, rest: &str) -> Result<Option<T>> {
    if rest.is_empty() {
        Ok(None)
    } else {
        parse_number(text, rest).map(Some)
    }
}

impl TryFrom<String> for Directive {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Break(loc) => write!(f, "break {}", loc),
            Self::Delete(id) => write!(f, "delete {}", id),
            Self::Run => write!(f, "run"),
            Self::Checkpoint => write!(f, "fred-ckpt"),
            Self::Continue { count: None } => write!(f, "continue"),
            Self::Continue { count: Some(n) } => write!(f, "continue {}", n),
            Self::Step { count: 1 } => write!(f, "step"),
            Self::Step { count } => write!(f, "step {}", count),
            Self::Next { count: 1 } => write!(f, "next"),
            Self::Next { count } => write!(f, "next {}", count),
            Self::Print(expr) => write!(f, "print {}", expr),
            Self::Restart { index: None } => write!(f, "fred-restart"),
            Self::Restart { index: Some(i) } => write!(f, "fred-restart {}", i),
            Self::ReverseStep => write!(f, "fred-reverse-step"),
            Self::ReverseNext => write!(f, "fred-reverse-next"),
            Self::ReverseContinue => write!(f, "fred-reverse-continue"),
            Self::ReverseFinish => write!(f, "fred-reverse-finish"),
            Self::ReverseWatch(pred) => write!(f, "fred-reverse-watch {}", pred),
        }
    }
}

/// An immutable, ordered sequence of directives
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(transparent)]
pub struct CommandScript(Vec<Directive>);

impl CommandScript {
    /// Parse every line, failing on the first invalid one
    pub fn parse<S: AsRef<str>>(lines: &[S]) -> Result<Self> {
        lines
            .iter()
            .map(|line| Directive::parse(line.as_ref()))
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    pub fn directives(&self) -> &[Directive] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Directive>> for CommandScript {
    fn from(directives: Vec<Directive>) -> Self {
        Self(directives)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_directives() {
        assert_eq!(Directive::parse("r").unwrap(), Directive::Run);
        assert_eq!(Directive::parse("fred-ckpt").unwrap(), Directive::Checkpoint);
        assert_eq!(
            Directive::parse("c").unwrap(),
            Directive::Continue { count: None }
        );
        assert_eq!(
            Directive::parse("c 100").unwrap(),
            Directive::Continue { count: Some(100) }
        );
        assert_eq!(Directive::parse("n 15").unwrap(), Directive::Next { count: 15 });
        assert_eq!(Directive::parse("step").unwrap(), Directive::Step { count: 1 });
        assert_eq!(Directive::parse("d 2").unwrap(), Directive::Delete(2));
        assert_eq!(Directive::parse("fred-rs").unwrap(), Directive::ReverseStep);
        assert_eq!(Directive::parse("fred-reverse-next").unwrap(), Directive::ReverseNext);
        assert_eq!(Directive::parse("fred-rc").unwrap(), Directive::ReverseContinue);
        assert_eq!(Directive::parse("fred-reverse-finish").unwrap(), Directive::ReverseFinish);
    }

    #[test]
    fn test_parse_restart() {
        assert_eq!(
            Directive::parse("fred-restart").unwrap(),
            Directive::Restart { index: None }
        );
        assert_eq!(
            Directive::parse("fred-restart 2").unwrap(),
            Directive::Restart { index: Some(2) }
        );
        assert!(Directive::parse("fred-restart -1").is_err());
    }

    #[test]
    fn test_parse_break_locations() {
        assert_eq!(
            Directive::parse("b main").unwrap(),
            Directive::Break(Location::Function("main".to_string()))
        );
        assert_eq!(
            Directive::parse("b 4619").unwrap(),
            Directive::Break(Location::Line(4619))
        );
        assert_eq!(
            Directive::parse("break test-list.c:30").unwrap(),
            Directive::Break(Location::FileLine {
                file: "test-list.c".to_string(),
                line: 30
            })
        );
        assert!(Directive::parse("b").is_err());
    }

    #[test]
    fn test_parse_reverse_watch() {
        let directive = Directive::parse("fred-rw list_len(head) < 10").unwrap();
        assert_eq!(
            directive,
            Directive::ReverseWatch(Predicate {
                expr: "list_len(head)".to_string(),
                op: CmpOp::Lt,
                value: 10
            })
        );
        assert_eq!(directive.to_string(), "fred-reverse-watch list_len(head) < 10");
    }

    #[test]
    fn test_predicate_keeps_arrow_in_expression() {
        let pred = Predicate::parse("head->next->value >= -3").unwrap();
        assert_eq!(pred.expr, "head->next->value");
        assert_eq!(pred.op, CmpOp::Ge);
        assert_eq!(pred.value, -3);

        let pred = Predicate::parse("node->len > 4").unwrap();
        assert_eq!(pred.expr, "node->len");
        assert_eq!(pred.op, CmpOp::Gt);
    }

    #[test]
    fn test_predicate_rejects_missing_operand() {
        assert!(Predicate::parse("solution").is_err());
        assert!(Predicate::parse("< 10").is_err());
        assert!(Predicate::parse("solution < lots").is_err());
    }

    #[test]
    fn test_unknown_and_malformed_directives_rejected() {
        assert!(Directive::parse("fred-bogus").is_err());
        assert!(Directive::parse("").is_err());
        assert!(Directive::parse("r now").is_err());
        assert!(Directive::parse("n 0").is_err());
        assert!(Directive::parse("p").is_err());
    }

    #[test]
    fn test_display_renders_console_syntax() {
        let script =
            CommandScript::parse(&["b main", "r", "fred-ckpt", "c 100", "fred-restart 1", "n"])
                .unwrap();
        let rendered: Vec<String> = script.directives().iter().map(|d| d.to_string()).collect();
        assert_eq!(
            rendered,
            vec!["break main", "run", "fred-ckpt", "continue 100", "fred-restart 1", "next"]
        );
    }

    #[test]
    fn test_display_renders_reverse_long_names() {
        let script =
            CommandScript::parse(&["fred-rs", "fred-rn", "fred-rc", "fred-rf", "fred-rw t < 3"])
                .unwrap();
        let rendered: Vec<String> = script.directives().iter().map(|d| d.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "fred-reverse-step",
                "fred-reverse-next",
                "fred-reverse-continue",
                "fred-reverse-finish",
                "fred-reverse-watch t < 3",
            ]
        );
        for line in &rendered {
            assert_eq!(Directive::parse(line).unwrap().to_string(), *line);
        }
    }

    #[test]
    fn test_script_parse_reports_first_bad_line() {
        let err = CommandScript::parse(&["b main", "frobnicate", "c"]).unwrap_err();
        match err {
            Error::InvalidDirective { text, .. } => assert_eq!(text, "frobnicate"),
            other => panic!("Expected InvalidDirective, got {other:?}"),
        }
    }

    #[test]
    fn test_script_deserializes_from_yaml() {
        let script: CommandScript =
            serde_yaml::from_str("[\"b main\", \"r\", \"fred-ckpt\"]").unwrap();
        assert_eq!(script.len(), 3);
        assert!(serde_yaml::from_str::<CommandScript>("[\"jump 5\"]").is_err());
    }
}
