//! Common error types for kbsync

use thiserror::Error;

/// Common result type for kbsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the synchronization engine
#[derive(Error, Debug)]
pub enum Error {
    /// Non-success HTTP status whose body could not be parsed as JSON
    #[error("HTTP Error {status}: {status_text}")]
    Http { status: u16, status_text: String },

    /// Server-reported failure: the body's `detail` field, or the
    /// stringified JSON body when no `detail` is present
    #[error("{0}")]
    Api(String),

    /// Transport-level failure (wraps reqwest::Error)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Payload decoding failure (wraps serde_json::Error)
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
