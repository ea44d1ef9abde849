//! Error types for rifa-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in rifa-core
#[derive(Debug, Error)]
pub enum Error {
    /// Registration blocked by an already-taken raffle number
    #[error("number {0} is already registered")]
    DuplicateNumber(String),

    /// A raffle number that does not parse as a base-10 integer
    #[error("invalid raffle number '{0}': not a base-10 integer")]
    InvalidNumber(String),

    /// Registration requires a buyer name
    #[error("buyer name must not be empty")]
    EmptyName,

    /// Merge source file does not exist
    #[error("source file '{0}' not found")]
    SourceNotFound(PathBuf),

    /// Merge source lacks the required columns
    #[error("invalid format in '{path}': {message}")]
    InvalidFormat { path: PathBuf, message: String },

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

    /// Failed to copy the store file during export
    #[error("failed to copy '{from}' to '{to}': {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV parsing error from the csv crate
    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

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
