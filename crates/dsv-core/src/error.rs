//! Error types for dsv-core

use crate::encoding::Encoding;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Which history stack an operation tried to pop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOp {
    Undo,
    Redo,
}

impl fmt::Display for HistoryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryOp::Undo => write!(f, "undo"),
            HistoryOp::Redo => write!(f, "redo"),
        }
    }
}

/// What an out-of-range index was addressing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Row,
    Column,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::Row => write!(f, "row"),
            IndexKind::Column => write!(f, "column"),
        }
    }
}

/// Errors that can occur in dsv-core
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input bytes are not valid under the declared encoding
    #[error("invalid {encoding} input at byte {offset}: {message}")]
    Encoding {
        encoding: Encoding,
        offset: usize,
        message: String,
    },

    /// A record's field count disagrees with the table's column count
    #[error("record {record} (line {line}) has {found} fields, expected {expected}")]
    RaggedRow {
        record: usize,
        line: u64,
        expected: usize,
        found: usize,
    },

    /// A row of the wrong width was offered to a table
    #[error("row has {found} fields, table has {expected} columns")]
    Shape { expected: usize, found: usize },

    /// A row with no fields at all
    #[error("rows must contain at least one field")]
    EmptyRow,

    /// Removing the only column of a table that still has rows
    #[error("cannot remove the last column of a non-empty table")]
    LastColumn,

    /// Out-of-bounds row or column access
    #[error("{kind} index {index} out of range (len {len})")]
    Index {
        kind: IndexKind,
        index: usize,
        len: usize,
    },

    /// A rule reported its own failure
    #[error("rule '{rule}' failed: {message}")]
    Rule { rule: String, message: String },

    /// Undo/redo with nothing on the stack
    #[error("nothing to {0}")]
    EmptyHistory(HistoryOp),

    /// The configured delimiter is not usable by the codec
    #[error("invalid delimiter {0:?}: expected a single ASCII character")]
    InvalidDelimiter(String),

    /// CSV reader/writer error from the csv crate
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Directory traversal error
    #[error("failed to traverse directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a rule failure
    pub fn rule(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Rule {
            rule: rule.into(),
            message: message.into(),
        }
    }

    pub(crate) fn row_index(index: usize, len: usize) -> Self {
        Error::Index {
            kind: IndexKind::Row,
            index,
            len,
        }
    }

    pub(crate) fn column_index(index: usize, len: usize) -> Self {
        Error::Index {
            kind: IndexKind::Column,
            index,
            len,
        }
    }

    /// Whether this is the expected "nothing to undo/redo" condition
    pub fn is_empty_history(&self) -> bool {
        matches!(self, Error::EmptyHistory(_))
    }
}
