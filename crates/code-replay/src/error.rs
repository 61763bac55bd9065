//! Error types.

use thiserror::Error;

/// Errors raised while loading a recorded trace.
#[derive(Debug, Error)]
pub enum TraceError {
    /// The trace is not valid JSON or does not have the expected shape.
    #[error("malformed trace: {0}")]
    Json(#[from] serde_json::Error),

    /// A time delta is negative, NaN or infinite.
    #[error("entry {index} has invalid time delta {delta}")]
    InvalidDelta {
        /// Index of the offending entry.
        index: usize,
        /// The delta as read from the trace.
        delta: f64,
    },

    /// A structured entry could not be decoded.
    #[error("entry {index}: {source}")]
    Entry {
        /// Index of the offending entry.
        index: usize,
        /// Underlying change-set error.
        #[source]
        source: ChangeSetError,
    },
}

/// Errors raised by change-set operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChangeSetError {
    /// The change set was applied to (or composed with) a document of the wrong length.
    #[error("change set expects a document of length {expected}, got {actual}")]
    LengthMismatch {
        /// Length the change set was built for.
        expected: usize,
        /// Length it was given.
        actual: usize,
    },

    /// The serialized change set is not in the expected array format.
    #[error("malformed change set: {0}")]
    Malformed(String),
}

/// Errors raised while constructing a replayer.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The start time names a marker the host does not know about.
    #[error("unknown marker '{0}'")]
    UnknownMarker(String),

    /// The start time looks like a timestamp but cannot be parsed.
    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    /// The trace could not be loaded.
    #[error(transparent)]
    Trace(#[from] TraceError),

    /// The structured trace does not fit the initial document.
    #[error(transparent)]
    ChangeSet(#[from] ChangeSetError),
}
