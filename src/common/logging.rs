//! Logging and tracing configuration
//!
//! The result table owns stdout, so all diagnostics go to stderr. A second,
//! more verbose copy is written to a log file for post-mortem inspection of
//! failed runs.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use super::paths;

/// Handle keeping the file writer alive until the harness exits
pub struct LogGuard {
    pub log_file: Option<PathBuf>,
    _guard: Option<WorkerGuard>,
}

/// Initialize tracing for a harness run
///
/// Stderr verbosity is controlled by `RUST_LOG`. Without it, only warnings are
/// shown, or lifecycle information when child output was requested.
pub fn init(show_child_output: bool) -> LogGuard {
    let default_directive = if show_child_output {
        "fredtest=info,warn"
    } else {
        "fredtest=warn"
    };
    let stderr_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(stderr_filter);

    let file = open_log_file();
    let (file_layer, guard, log_file) = match file {
        Some((path, handle)) => {
            let (writer, guard) = tracing_appender::non_blocking(handle);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true)
                .with_filter(EnvFilter::new("fredtest=debug,info"));
            (Some(layer), Some(guard), Some(path))
        }
        None => (None, None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    LogGuard {
        log_file,
        _guard: guard,
    }
}

/// Open (append) the harness log file, if the data directory is usable
fn open_log_file() -> Option<(PathBuf, std::fs::File)> {
    let dir = paths::log_dir()?;
    std::fs::create_dir_all(&dir).ok()?;
    let path = dir.join("fredtest.log");
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
    {
        Ok(file) => Some((path, file)),
        Err(e) => {
            eprintln!("Warning: Could not open log file: {}", e);
            None
        }
    }
}
