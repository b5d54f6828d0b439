//! Error types for the keyword archive backend

use thiserror::Error;

/// Main error type for archive queries
///
/// Variants split into two propagation classes: fatal errors
/// ([`Config`](ArchiveError::Config) and
/// [`Connection`](ArchiveError::Connection)) abort a whole batch before any
/// per-query work runs, everything else is confined to the sub-query that
/// raised it and reported in that query's response slot.
///
/// A keyword with no metadata row is deliberately not an error: lookups
/// return `Ok(None)` and the pipeline answers with a successful empty frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArchiveError {
    /// Bad or missing connection settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cannot open or ping the archive store
    #[error("Connection error: {0}")]
    Connection(String),

    /// Store access failed while resolving metadata or counting rows
    #[error("Lookup error: {0}")]
    Lookup(String),

    /// A fetched row could not be decoded
    #[error("Scan error: {0}")]
    Scan(String),

    /// Unit conversion selector outside the supported set
    #[error("Unknown unit conversion: {0}")]
    UnknownConversion(i32),

    /// Transform selector outside the supported set
    #[error("Unknown transform: {0}")]
    UnknownTransform(i32),

    /// The row stream reported a failure after the fetch loop completed
    ///
    /// Attached to an otherwise possibly populated frame, so callers see a
    /// partial-success response rather than losing the buffered rows.
    #[error("Row iteration error: {0}")]
    RowIteration(String),

    /// The sub-query payload could not be parsed
    #[error("Malformed query: {0}")]
    MalformedQuery(String),

    /// The caller gave up before this sub-query finished
    #[error("Query cancelled")]
    Cancelled,
}

impl ArchiveError {
    /// Whether this error aborts the whole batch rather than one sub-query
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Connection(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ArchiveError>;
