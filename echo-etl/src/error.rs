//! Error types for echo-etl
//!
//! Only `Bootstrap` and `Output` are fatal to a run. Every other variant is
//! recorded against the call or batch that produced it and the run carries on
//! with fewer rows.

use thiserror::Error;

/// Pipeline error type
#[derive(Debug, Error)]
pub enum EtlError {
    /// One analytics call failed (network, HTTP status, malformed JSON)
    #[error("Fetch failed for {source_id} in {period}: {reason}")]
    TransientFetch {
        source_id: String,
        period: String,
        reason: String,
    },

    /// A non-empty payload's headers do not fit the pass schema
    #[error("Schema mismatch for {source_id} in {period}: {detail}")]
    SchemaMismatch {
        source_id: String,
        period: String,
        detail: String,
    },

    /// Periods of different cadences were compared
    #[error("Mixed cadences in period comparison: {0}")]
    MixedCadence(String),

    /// String is not a monthly, quarterly or annual period token
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    /// Shared identifiers could not be resolved before retrieval
    #[error("Bootstrap failed: {0}")]
    Bootstrap(String),

    /// Output artifact could not be written
    #[error("Output failed: {0}")]
    Output(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// echo-common error
    #[error("Common error: {0}")]
    Common(#[from] echo_common::Error),
}

impl EtlError {
    /// Whether the error must abort the run
    pub fn is_fatal(&self) -> bool {
        matches!(self, EtlError::Bootstrap(_) | EtlError::Output(_))
    }
}

/// Result type for pipeline operations
pub type EtlResult<T> = Result<T, EtlError>;
