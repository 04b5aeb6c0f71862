// Public fallible APIs in this crate share one concrete error contract (`ShotlogError`).
// Repeating per-function `# Errors` boilerplate obscures behavior more than it clarifies.
#![allow(
    clippy::missing_errors_doc,
    reason = "crate-wide fallible API uses one explicit error type; per-item boilerplate would duplicate contract"
)]

pub mod batch;
pub mod cancel;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod extract;
pub mod invoke;
pub mod models;
pub mod progress;
pub mod prompt;
pub mod resolve;
pub mod store;
pub mod timestamp;

pub use cancel::CancelToken;
pub use engine::{BatchReport, Enricher};
pub use error::{Result, ShotlogError};
pub use models::{EnrichOptions, Record, RecordStatus, RunOutcome};
pub use store::RecordStore;
