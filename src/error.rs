//! Error taxonomy for the analysis engine.
//!
//! The severities differ: `Config` aborts startup, `Validation` excludes a
//! single ticket and lets the batch continue, `NotFound` is handled by the
//! expected-volume model's fallback, and `Busy` is a retryable condition
//! surfaced to the API layer as 409.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad registry/reference data. Fatal — fails startup.
    #[error("config error: {0}")]
    Config(String),

    /// One malformed ticket. Recovered locally; the batch continues.
    #[error("ticket {ticket_id} rejected: {reason}")]
    Validation { ticket_id: String, reason: String },

    /// Lookup miss (no such depot, no edge between the pair).
    #[error("not found: {0}")]
    NotFound(String),

    /// A refresh is already in flight.
    #[error("analysis refresh already in progress")]
    Busy,

    /// Upstream data could not be fetched or parsed.
    #[error("source error: {0}")]
    Source(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
