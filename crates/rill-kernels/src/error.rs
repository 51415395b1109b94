//! Error types for rill kernels

use thiserror::Error;

/// Result type alias using the kernels' [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by partitioning and the streaming pipeline.
///
/// Empty tiles and empty rows are legal states, not errors.
#[derive(Error, Debug)]
pub enum Error {
    /// The requested partition grid cannot be realized under the hardware
    /// tile bound. Fatal for the run; never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The input matrix violates a CSR invariant. Detected before any tile
    /// work starts.
    #[error("malformed matrix: {0}")]
    MalformedMatrix(String),

    /// A pipeline stage observed a record out of the expected sequence.
    /// Aborts the offending tile only; other tiles share no mutable state.
    #[error("pipeline protocol violation in {stage}: {detail}")]
    ProtocolViolation {
        /// Stage that observed the violation
        stage: &'static str,
        /// What went wrong
        detail: String,
    },
}

impl Error {
    pub(crate) fn protocol(stage: &'static str, detail: impl Into<String>) -> Self {
        Self::ProtocolViolation { stage, detail: detail.into() }
    }
}
