//! Session orchestration for replay scenarios
//!
//! [`HarnessContext`] ties the run settings, the single debugger session and
//! the replay oracle together. Scenarios drive it through typed
//! [`script::Directive`]s and oracle checks.

pub mod context;
pub mod executor;
pub mod oracle;
pub mod script;
pub mod session;

#[cfg(test)]
pub(crate) mod fakes;

pub use context::{HarnessContext, Settings};
pub use executor::run_script;
pub use oracle::{Check, Oracle};
pub use script::{CommandScript, Directive, Location, Predicate};
pub use session::{CheckpointIndex, Session, SessionManager, SessionOptions, SessionState};
