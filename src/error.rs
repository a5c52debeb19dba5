//! Error types for Vigil
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use crate::domain::RunRecord;

/// All error types that can occur in Vigil
#[derive(Debug, Error)]
pub enum VigilError {
    /// Monitoring input too small to be meaningful (e.g. empty drift sample)
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Population sample source unreachable
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Run lifecycle misuse (start/end called out of sequence)
    #[error("Invalid run state: {0}")]
    RunState(String),

    /// Hand-off to the experiment tracker failed at end of run.
    ///
    /// Carries the fully-assembled record so the caller can retry or
    /// persist it elsewhere instead of losing the run.
    #[error("Tracker write failed: {reason}")]
    TrackerWrite {
        /// Description of the underlying tracker failure
        reason: String,
        /// The sealed record that could not be written
        record: Box<RunRecord>,
    },

    /// Chat agent or analysis stage failure
    #[error("Agent error: {0}")]
    Agent(String),

    /// Invalid configuration value
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Vigil operations
pub type Result<T> = std::result::Result<T, VigilError>;
