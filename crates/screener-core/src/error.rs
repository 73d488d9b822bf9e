//! Error types for screener operations.
//!
//! This module defines [`ScreenerError`] which covers all error cases that can occur
//! when fetching filings, extracting instance documents, persisting records, or
//! normalizing raw facts. [`FailureKind`] groups the variants into the coarse
//! network / format / data classes used for per-record failure accounting.

use thiserror::Error;

/// Errors that can occur during screener operations.
#[derive(Error, Debug)]
pub enum ScreenerError {
    /// Network-related errors (connection failures, timeouts, etc.).
    #[error("Network error: {0}")]
    Network(String),

    /// A request completed with a non-success HTTP status.
    #[error("HTTP {status} for {url}")]
    HttpStatus {
        /// The URL that was requested.
        url: String,
        /// The status code returned by the server.
        status: u16,
    },

    /// A quarterly index row did not split into the expected fields.
    #[error("Malformed index row: expected 5 fields, found {fields}")]
    MalformedRow {
        /// Number of `|`-separated fields found on the row.
        fields: usize,
    },

    /// A quarterly index line exceeded the read buffer.
    #[error("Index line exceeds {limit} bytes")]
    LineTooLong {
        /// Maximum accepted line length in bytes.
        limit: usize,
    },

    /// A filing name did not reference the expected `.txt` document.
    #[error("Unexpected file type: {0}")]
    UnexpectedFileType(String),

    /// No instance document was found in an XBRL archive.
    #[error("No instance document found in {0}")]
    InstanceNotFound(String),

    /// A CIK failed to parse as a base-10 integer.
    #[error("Invalid CIK: {0}")]
    InvalidCik(String),

    /// Error opening or reading an archive.
    #[error("Archive error: {0}")]
    Archive(String),

    /// Error parsing a document.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Error interacting with a store.
    #[error("Store error: {0}")]
    Store(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Filesystem I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other error.
    #[error("{0}")]
    Other(String),
}

/// Coarse failure classes used when accounting for per-record failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// GET error or non-success status.
    Network,
    /// Unexpected shape of an index line, filename or archive.
    Format,
    /// Values that cannot be used (bad CIK, unset canonical fields).
    Data,
    /// Storage, I/O and everything else.
    Internal,
}

impl ScreenerError {
    /// Classifies this error.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Network(_) | Self::HttpStatus { .. } => FailureKind::Network,
            Self::MalformedRow { .. }
            | Self::LineTooLong { .. }
            | Self::UnexpectedFileType(_)
            | Self::InstanceNotFound(_)
            | Self::Archive(_) => FailureKind::Format,
            Self::InvalidCik(_) => FailureKind::Data,
            Self::Parse(_)
            | Self::Store(_)
            | Self::InvalidParameter(_)
            | Self::Io(_)
            | Self::Other(_) => FailureKind::Internal,
        }
    }
}

/// Result type alias using [`ScreenerError`].
pub type Result<T> = std::result::Result<T, ScreenerError>;
