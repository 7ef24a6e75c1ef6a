//! Error types for the NewsML codec.

use thiserror::Error;

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while importing, exporting or replaying documents.
#[derive(Error, Debug)]
pub enum Error {
    /// The input is not well-formed XML.
    #[error("malformed XML: {0}")]
    MalformedXml(String),

    /// The XML is well-formed but lacks a required structural element.
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// A change record could not be decoded or applied.
    #[error("replay failed at change {index}: {reason}")]
    Replay { index: usize, reason: String },

    /// A mutation helper rejected its arguments.
    #[error(transparent)]
    Mutation(#[from] MutationError),

    /// No snapshot or change log can produce the requested version.
    #[error("document '{doc_id}' has no version {version}")]
    UnknownVersion { doc_id: String, version: u64 },

    /// A selector string could not be parsed.
    #[error("invalid selector: {0}")]
    Selector(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the node mutation helpers.
///
/// Every helper validates before touching the document, so receiving one of
/// these means the document is unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    #[error("node '{0}' not found")]
    NodeNotFound(String),

    #[error("container '{0}' not found")]
    ContainerNotFound(String),

    #[error("position {position} out of range for '{container}' (length {len})")]
    PositionOutOfRange {
        container: String,
        position: usize,
        len: usize,
    },

    #[error("node id '{0}' already exists")]
    DuplicateId(String),

    #[error("invalid path {path:?} for node '{node}'")]
    InvalidPath { node: String, path: Vec<String> },

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("invalid change record: {0}")]
    InvalidRecord(String),
}

impl Error {
    /// Wraps any error as a replay failure at `index`.
    pub fn at_change(self, index: usize) -> Error {
        match self {
            Error::Replay { .. } => self,
            other => Error::Replay {
                index,
                reason: other.to_string(),
            },
        }
    }
}
