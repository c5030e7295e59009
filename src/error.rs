//! Error types for rs-mediasweep.
//!
//! Element-local failures (one node, one URL) are absorbed by the callers and only
//! show up in aggregate counts. The variants here are the ones that can reach the
//! caller of an operation.

use std::time::Duration;

/// Error type for pipeline operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A selector string could not be parsed.
    #[error("Invalid selector: {0}")]
    SelectorInvalid(String),

    /// No qualifying match was found within the wait budget.
    #[error("No qualifying match for {selectors:?} after {attempts} attempts ({elapsed:?})")]
    ResolutionTimeout {
        /// Candidate selectors that were tried, in order.
        selectors: Vec<String>,
        /// Number of search attempts made.
        attempts: u32,
        /// Total time spent including backoff.
        elapsed: Duration,
    },

    /// A raw URL could not be canonicalized.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The host could not resolve natural dimensions for a resource.
    #[error("Resource probe failed for {url}: {reason}")]
    ResourceProbeFailed {
        /// URL that was probed.
        url: String,
        /// Host-supplied reason.
        reason: String,
    },

    /// Simulated activation of an element failed.
    #[error("Actuation failed: {0}")]
    ActuationFailed(String),

    /// A batch worker failed and `continue_on_error` was off.
    #[error("Batch item {index} failed: {message}")]
    BatchItemFailed {
        /// Input position of the failing item.
        index: usize,
        /// Worker error message.
        message: String,
    },

    /// The operation was cancelled through its cancellation token.
    #[error("Operation cancelled")]
    Cancelled,

    /// The host environment reported an unexpected failure.
    #[error("Host error: {0}")]
    Host(String),
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
