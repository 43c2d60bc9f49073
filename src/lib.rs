//! Validation and analytics engine for HTTP API test automation.
//!
//! The crate provides the pieces a harness composes around an HTTP client:
//! a chained response-validation pipeline, strategy-selectable execution
//! disciplines with a uniform result contract, an append-only execution
//! recorder, an analytics engine deriving trends, failure clusters, and
//! flakiness from the recorded history, and a concurrent load runner.
pub mod analytics;
pub mod client;
pub mod export;
pub mod load;
pub mod recorder;
pub mod response;
pub mod retry;
pub mod strategy;
pub mod validation;
