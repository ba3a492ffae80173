//! Error types for truthguard.

use thiserror::Error;

/// Result type alias using the crate error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while submitting claims or retrieving verification results.
#[derive(Debug, Error)]
pub enum Error {
    /// A single request failed at the transport level or with a 5xx status.
    #[error("transient network failure: {0}")]
    TransientNetworkFailure(String),

    /// The gateway answered 429.
    #[error("rate limited by {0}")]
    RateLimited(String),

    /// The retry wrapper gave up on one request.
    #[error("all {attempts} attempts to {url} failed, last error: {last}")]
    AllRetriesExhausted {
        /// Target of the request.
        url: String,
        /// Number of attempts made.
        attempts: u32,
        /// Description of the final failure.
        last: String,
    },

    /// No gateway endpoint produced a usable answer.
    #[error("all {0} gateway endpoints failed")]
    AllEndpointsFailed(usize),

    /// A result payload could not be decoded into a result record.
    #[error("malformed result: {0}")]
    MalformedResult(String),

    /// The wallet refused to connect, report an address, or sign.
    #[error("wallet unavailable: {0}")]
    WalletUnavailable(String),

    /// The signed claim transaction was not accepted by any gateway.
    #[error("upload failed: {0}")]
    UploadFailed(String),

    /// A gateway answered with a query-level error payload.
    #[error("gateway error: {0}")]
    Gateway(String),

    /// A transaction query failed validation before serialization.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A claim was rejected before submission.
    #[error("invalid claim: {0}")]
    InvalidClaim(String),

    /// A transaction identifier was empty or outside the base64url alphabet.
    #[error("invalid transaction id: {0:?}")]
    InvalidId(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether a later attempt at the same operation could succeed.
    ///
    /// A polling tick that fails with a retryable error keeps its session
    /// pending; anything else ends the session as failed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransientNetworkFailure(_)
                | Self::RateLimited(_)
                | Self::AllRetriesExhausted { .. }
                | Self::AllEndpointsFailed(_)
                | Self::MalformedResult(_)
                | Self::Gateway(_)
                | Self::Io(_)
                | Self::Json(_)
        )
    }
}
