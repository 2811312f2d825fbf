//! Error taxonomy for the fetch-cache-dedupe pipeline.
//!
//! Each boundary gets its own enum so callers can match on what actually went
//! wrong:
//!
//! | Error | Raised by | Surfaced as |
//! |-------|-----------|-------------|
//! | [`NetworkError`] | HTTP layer | retried if transient, then `FAILED` |
//! | [`ExtractionError`] | HTML field extraction | field default, never propagated |
//! | [`ParseError`] | paper-search response parsing | empty result + `FAILED` |
//! | [`BookmarkError`] | bookmark store | typed rejection |
//! | [`SummarizeError`] | language-model backend | placeholder text |

use thiserror::Error;

/// Failure of a single HTTP request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NetworkError {
    /// The request did not complete within its timeout.
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// The connection could not be established or was reset.
    #[error("connection to {url} failed: {message}")]
    Connect { url: String, message: String },

    /// The server answered with a status worth retrying (429, 502, 503, 504).
    #[error("{url} returned retryable status {status}")]
    RetryableStatus { url: String, status: u16 },

    /// The server answered with a status that will not improve on retry.
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    /// The URL could not be parsed or used to build a request.
    #[error("invalid url {url}: {message}")]
    InvalidUrl { url: String, message: String },

    /// The response body could not be read.
    #[error("failed reading body from {url}: {message}")]
    Body { url: String, message: String },
}

impl NetworkError {
    /// Whether the retry policy should try again after this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            NetworkError::Timeout { .. }
                | NetworkError::Connect { .. }
                | NetworkError::RetryableStatus { .. }
                | NetworkError::Body { .. }
        )
    }

    pub fn url(&self) -> &str {
        match self {
            NetworkError::Timeout { url }
            | NetworkError::Connect { url, .. }
            | NetworkError::RetryableStatus { url, .. }
            | NetworkError::Status { url, .. }
            | NetworkError::InvalidUrl { url, .. }
            | NetworkError::Body { url, .. } => url,
        }
    }
}

/// An expected structural element was missing from a page.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("no element matches `{selector}`")]
    Missing { selector: String },

    #[error("element matching `{selector}` has no text")]
    Empty { selector: String },

    #[error("invalid selector `{selector}`: {message}")]
    InvalidSelector { selector: String, message: String },
}

/// The paper-search API returned a document that could not be read.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed search response: {message}")]
pub struct ParseError {
    pub message: String,
}

/// Failure of the external bookmark storage collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Rejections from the bookmark store.
#[derive(Debug, Error)]
pub enum BookmarkError {
    /// A bookmark with this url is already stored.
    #[error("{url} is already bookmarked")]
    AlreadyExists { url: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failure of the opaque language-model capability.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SummarizeError {
    /// No backend is configured.
    #[error("language model is not configured")]
    Unavailable,

    /// The backend reported an error.
    #[error("language model call failed: {0}")]
    Backend(String),

    /// Nothing to summarize.
    #[error("no content to summarize")]
    EmptyInput,
}

/// Configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed reading config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed parsing config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}
