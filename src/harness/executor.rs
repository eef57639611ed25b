//! Script execution

use crate::common::Result;

use super::script::CommandScript;
use super::session::Session;

/// Deliver every directive of `script` in order
///
/// Stops at the first failing directive; nothing is retried.
pub async fn run_script(session: &mut Session, script: &CommandScript) -> Result<()> {
    for (step, directive) in script.directives().iter().enumerate() {
        if let Err(e) = session.apply(directive).await {
            tracing::debug!(session = session.id(), step, %directive, error = %e, "Script aborted");
            return Err(e);
        }
    }
    Ok(())
}
