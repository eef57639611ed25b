//! Mock FReD front-end for integration testing
//!
//! Speaks the front-end's console protocol (one command per line, replies
//! terminated by the `(fred) ` prompt) over a deterministic program model, so
//! the harness can be exercised without DMTCP or gdb.
//!
//! The program is a single counter `t` running from 0 to `END`:
//! - `t == 0` is `main` at line 10
//! - `0 < t < END` is `build_list` at line `20 + t % 5`
//! - `t == END` is `print_solution` at line 30
//!
//! Variables: `counter` (= t), `list_len(head)` (= t / 5) and `solution`
//! (sum of 1..=t).
//!
//! Like gdb, `run` launches a real inferior process (a `sleep`) in the
//! front-end's process group and records its pid as `inferior.pid` in
//! `DMTCP_CHECKPOINT_DIR`. The mock never reaps it on `quit`.
//!
//! Set `MOCK_FRED_FAULT` to inject divergence:
//! - `restart-drift`: restarts land one step after the checkpoint
//! - `reverse-skew`: reverse step/next go back two steps instead of one

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use fredtest::harness::{Directive, Location, Predicate};

const PROMPT: &str = "(fred) ";
const END: u32 = 100;
const FILE: &str = "mock.c";

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let fault = std::env::var("MOCK_FRED_FAULT").ok();

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut reader = BufReader::new(stdin.lock());
    let mut writer = stdout.lock();

    let pid_dir = std::env::var_os("DMTCP_CHECKPOINT_DIR").map(PathBuf::from);
    let mut state = MockState::new(fault.as_deref(), pid_dir);

    let mut banner = format!("FReD mock front-end ({})\n", args.join(" "));
    if args.iter().any(|a| a == "--enable-debug") {
        banner.push_str("DEBUG: debug messages enabled\n");
    }
    send_reply(&mut writer, &banner);

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            break; // EOF
        }
        let command = line.trim();

        if command == "quit" || command == "q" {
            break;
        }
        if command == "y" || command.is_empty() {
            send_reply(&mut writer, "");
            continue;
        }

        let reply = state.process_command(command);
        send_reply(&mut writer, &reply);
    }
}

fn send_reply<W: Write>(writer: &mut W, reply: &str) {
    writer.write_all(reply.as_bytes()).ok();
    if !reply.is_empty() && !reply.ends_with('\n') {
        writer.write_all(b"\n").ok();
    }
    writer.write_all(PROMPT.as_bytes()).ok();
    writer.flush().ok();
}

#[derive(Clone, Copy, PartialEq)]
enum Fault {
    RestartDrift,
    ReverseSkew,
}

struct MockState {
    t: u32,
    running: bool,
    breakpoints: Vec<(u32, Location)>,
    next_breakpoint: u32,
    checkpoints: Vec<u32>,
    history: u32,
    fault: Option<Fault>,
    inferior: Option<Child>,
    pid_dir: Option<PathBuf>,
}

fn line_at(t: u32) -> u32 {
    match t {
        0 => 10,
        t if t >= END => 30,
        t => 20 + t % 5,
    }
}

fn function_at(t: u32) -> &'static str {
    match t {
        0 => "main",
        t if t >= END => "print_solution",
        _ => "build_list",
    }
}

fn value_of(expr: &str, t: u32) -> Option<i64> {
    let t = i64::from(t);
    match expr {
        "counter" => Some(t),
        "list_len(head)" => Some(t / 5),
        "solution" => Some(t * (t + 1) / 2),
        _ => None,
    }
}

impl MockState {
    fn new(fault: Option<&str>, pid_dir: Option<PathBuf>) -> Self {
        let fault = match fault {
            Some("restart-drift") => Some(Fault::RestartDrift),
            Some("reverse-skew") => Some(Fault::ReverseSkew),
            _ => None,
        };
        Self {
            t: 0,
            running: false,
            breakpoints: Vec::new(),
            next_breakpoint: 1,
            checkpoints: Vec::new(),
            history: 0,
            fault,
            inferior: None,
            pid_dir,
        }
    }

    /// Replace the inferior process with a fresh one
    fn launch_inferior(&mut self) {
        self.stop_inferior();
        let Ok(child) = Command::new("sleep")
            .arg("300")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        else {
            return;
        };
        if let Some(dir) = &self.pid_dir {
            std::fs::write(dir.join("inferior.pid"), child.id().to_string()).ok();
        }
        self.inferior = Some(child);
    }

    fn stop_inferior(&mut self) {
        if let Some(mut child) = self.inferior.take() {
            child.kill().ok();
            child.wait().ok();
        }
    }

    fn process_command(&mut self, command: &str) -> String {
        if command == "where" || command.starts_with("where ") || command == "bt" {
            return self.frame();
        }

        let directive = match Directive::parse(command) {
            Ok(d) => d,
            Err(_) => {
                let name = command.split_whitespace().next().unwrap_or(command);
                return format!("Undefined command: \"{}\".  Try \"help\".", name);
            }
        };

        match directive {
            Directive::Break(location) => self.add_breakpoint(location),
            Directive::Delete(id) => {
                let before = self.breakpoints.len();
                self.breakpoints.retain(|(bp, _)| *bp != id);
                if self.breakpoints.len() == before {
                    format!("No breakpoint number {}.", id)
                } else {
                    String::new()
                }
            }
            Directive::Print(expr) => self.print(&expr),
            Directive::Run => {
                self.t = 0;
                self.running = true;
                self.launch_inferior();
                if let Some(id) = self.breakpoint_at(0) {
                    return self.stop_at_breakpoint(id);
                }
                self.run_forward(1)
            }
            Directive::Restart { index } => {
                let index = index.unwrap_or(self.checkpoints.len().saturating_sub(1));
                let Some(&t) = self.checkpoints.get(index) else {
                    return format!("No checkpoint index {}.", index);
                };
                let drift = u32::from(self.fault == Some(Fault::RestartDrift));
                self.t = (t + drift).min(END);
                self.running = true;
                format!("Restarting from checkpoint {}.\n{}", index, self.frame())
            }
            _ if !self.running => "The program is not being run.".to_string(),
            Directive::Checkpoint => {
                self.checkpoints.push(self.t);
                format!("Checkpoint {} taken.", self.checkpoints.len() - 1)
            }
            Directive::Continue { count } => self.run_forward(count.unwrap_or(1)),
            Directive::Step { count } | Directive::Next { count } => {
                let target = self.t.saturating_add(count);
                if target > END {
                    return self.exit();
                }
                self.t = target;
                self.source_line()
            }
            Directive::ReverseStep | Directive::ReverseNext => {
                if self.t == 0 {
                    return "ERROR: No more reverse-execution history.".to_string();
                }
                let back = if self.fault == Some(Fault::ReverseSkew) { 2 } else { 1 };
                self.t = self.t.saturating_sub(back);
                self.source_line()
            }
            Directive::ReverseContinue => {
                for t in (0..self.t).rev() {
                    if let Some(id) = self.breakpoint_at(t) {
                        self.t = t;
                        return self.stop_at_breakpoint(id);
                    }
                }
                self.t = 0;
                self.source_line()
            }
            Directive::ReverseFinish => {
                if self.t == 0 {
                    return "ERROR: \"finish\" not meaningful in the outermost frame.".to_string();
                }
                self.t = 0;
                format!("Run back to call of #0  {}\n{}", function_at(0), self.source_line())
            }
            Directive::ReverseWatch(predicate) => self.reverse_watch(&predicate),
        }
    }

    fn add_breakpoint(&mut self, location: Location) -> String {
        let id = self.next_breakpoint;
        self.next_breakpoint += 1;
        let line = match &location {
            Location::Function(name) if name == "main" => 10,
            Location::Function(name) if name == "print_solution" => 30,
            Location::Function(_) => 20,
            Location::Line(line) | Location::FileLine { line, .. } => *line,
        };
        self.breakpoints.push((id, location));
        format!("Breakpoint {} at 0x4005{:02x}: file {}, line {}.", id, line, FILE, line)
    }

    fn breakpoint_at(&self, t: u32) -> Option<u32> {
        self.breakpoints
            .iter()
            .find(|(_, location)| match location {
                Location::Function(name) => name == function_at(t),
                Location::Line(line) | Location::FileLine { line, .. } => *line == line_at(t),
            })
            .map(|(id, _)| *id)
    }

    /// Continue, stopping at the `count`-th breakpoint crossing
    fn run_forward(&mut self, count: u32) -> String {
        let mut remaining = count;
        while self.t < END {
            self.t += 1;
            if let Some(id) = self.breakpoint_at(self.t) {
                remaining -= 1;
                if remaining == 0 {
                    return self.stop_at_breakpoint(id);
                }
            }
        }
        self.exit()
    }

    fn exit(&mut self) -> String {
        self.stop_inferior();
        self.running = false;
        self.t = END;
        "[Inferior 1 (process 4242) exited normally]".to_string()
    }

    fn reverse_watch(&mut self, predicate: &Predicate) -> String {
        for t in (0..self.t).rev() {
            match value_of(&predicate.expr, t) {
                Some(value) if predicate.op.holds(value, predicate.value) => {
                    self.t = t;
                    return self.source_line();
                }
                Some(_) => {}
                None => {
                    return format!("No symbol \"{}\" in current context.", predicate.expr);
                }
            }
        }
        format!("ERROR: '{}' never held in the recorded history.", predicate)
    }

    fn print(&mut self, expr: &str) -> String {
        if !self.running {
            return format!("No symbol \"{}\" in current context.", expr);
        }
        match value_of(expr, self.t) {
            Some(value) => {
                self.history += 1;
                format!("${} = {}", self.history, value)
            }
            None => format!("No symbol \"{}\" in current context.", expr),
        }
    }

    fn stop_at_breakpoint(&self, id: u32) -> String {
        format!(
            "\nBreakpoint {}, {} () at {}:{}\n{}",
            id,
            function_at(self.t),
            FILE,
            line_at(self.t),
            self.source_line()
        )
    }

    fn source_line(&self) -> String {
        format!("{}\t  /* t = {} */", line_at(self.t), self.t)
    }

    fn frame(&self) -> String {
        if !self.running {
            return "No stack.".to_string();
        }
        format!(
            "#0  {} () at {}:{}",
            function_at(self.t),
            FILE,
            line_at(self.t)
        )
    }
}
