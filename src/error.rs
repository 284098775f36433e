//! Error taxonomy of the binding layer.
//!
//! Every failure propagates to the caller; this layer performs no retries
//! and no silent recovery. Retry/backoff policy belongs to the native
//! crawler.

use thiserror::Error;

/// Errors surfaced by the crawler binding.
#[derive(Debug, Error)]
pub enum CrawlerError {
    /// The native side produced an integer code with no known mapping.
    #[error("unknown {kind} code {code} in native message")]
    UnknownEnumValue { kind: &'static str, code: u32 },

    /// A text field of a native message could not be decoded.
    #[error("malformed {field} field in native message: {reason}")]
    MalformedPayload { field: &'static str, reason: String },

    /// Loading the native library or resolving one of its symbols failed.
    #[error("native library call failed: {0}")]
    NativeCallFailure(#[from] libloading::Error),

    /// Caller-supplied arguments rejected before any native call was issued.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, CrawlerError>;
