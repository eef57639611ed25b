//! Pre-flight checks
//!
//! Nothing is started until every external tool the harness drives has been
//! located. A missing tool is fatal for the run.

use std::path::{Path, PathBuf};

use crate::common::config::PathsConfig;
use crate::common::{Error, Result};

/// Resolve every required tool, returning paths with each one made absolute
pub fn preflight(paths: &PathsConfig) -> Result<PathsConfig> {
    let mut resolved = paths.clone();
    resolved.fred = locate("fred", &paths.fred)?;
    resolved.dmtcp_coordinator = locate("dmtcp_coordinator", &paths.dmtcp_coordinator)?;
    resolved.dmtcp_command = locate("dmtcp_command", &paths.dmtcp_command)?;

    // The debugger is handed to the front-end by name; it only has to exist.
    locate("debugger", Path::new(&paths.debugger))?;

    if !paths.test_programs.is_dir() {
        tracing::warn!(
            dir = %paths.test_programs.display(),
            "Test programs directory not found; scenarios will fail to start"
        );
    }

    tracing::debug!(
        fred = %resolved.fred.display(),
        coordinator = %resolved.dmtcp_coordinator.display(),
        command = %resolved.dmtcp_command.display(),
        "Pre-flight checks passed"
    );
    Ok(resolved)
}

/// Find a tool given either a bare name (searched on PATH) or a path
fn locate(role: &str, tool: &Path) -> Result<PathBuf> {
    let is_bare_name = tool.components().count() == 1 && !tool.is_absolute();

    if is_bare_name {
        if let Ok(found) = which::which(tool) {
            return Ok(found);
        }
        // A bare name may still refer to a file in the working directory.
        if tool.is_file() {
            return Ok(std::env::current_dir()
                .map(|cwd| cwd.join(tool))
                .unwrap_or_else(|_| tool.to_path_buf()));
        }
        return Err(Error::missing_binary(
            &format!("{} ({})", tool.display(), role),
            &["PATH", "current directory"],
        ));
    }

    if tool.is_file() {
        return Ok(tool.to_path_buf());
    }
    Err(Error::missing_binary(
        &format!("{} ({})", tool.display(), role),
        &[tool.display().to_string()],
    ))
}
