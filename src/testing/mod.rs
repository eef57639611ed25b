//! FReD replay test suite
//!
//! Scenarios are YAML descriptors ([`scenario`]) held in a [`registry`] and
//! executed against the harness by the [`runner`], which prints one result
//! row per iteration through the [`report`] module.

pub mod registry;
pub mod report;
pub mod runner;
pub mod scenario;

pub use registry::{dispatch, Dispatch, Registry, Selection, INTEGRATION_SUITE};
pub use report::{write_json, Reporter};
pub use runner::{run_scenario, Outcome, TestResult};
pub use scenario::{Phase, Scenario, Step};
