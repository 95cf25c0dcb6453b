//! Durable job orchestrator.
//!
//! A job runs four activities in strict order:
//! - **Fetch**: retrieve the raw feed
//! - **StoreRaw**: persist the raw payload
//! - **ParseAndStore**: parse and write each article, bounded fan-out
//! - **StoreMetadata**: write the run summary
//!
//! Progress is recorded as history events; [`decide`] replays them to find the
//! next step, so a restarted process never repeats a completed activity.

mod config;
mod replay;
mod runner;
mod types;

pub use config::RetryConfig;
pub use replay::decide;
pub use runner::JobOrchestrator;
pub use types::{Decision, OrchestratorError, OrchestratorStatus};
