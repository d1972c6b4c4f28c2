//! Error types for document engines.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error raised by a document engine or one of its sessions.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The document could not be opened.
    #[error("Failed to open document {path}: {message}")]
    OpenFailed { path: PathBuf, message: String },

    /// File I/O error.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// The document package (zip container) is damaged or unwritable.
    #[error("Package error: {0}")]
    Package(#[from] zip::result::ZipError),

    /// A package part is not well-formed XML.
    #[error("Malformed XML in {part}: {message}")]
    MalformedXml { part: String, message: String },

    /// A required package part is missing.
    #[error("Missing package part: {0}")]
    MissingPart(String),

    /// An anchor no longer refers to anything in the document.
    #[error("Unknown anchor {0}")]
    UnknownAnchor(u64),

    /// A table reference no longer refers to anything in the document.
    #[error("Unknown table {0}")]
    UnknownTable(u64),

    /// A cell reference no longer refers to anything in the document.
    #[error("Unknown cell {0}")]
    UnknownCell(u64),

    /// The image file is in a format that cannot be embedded.
    #[error("Unsupported image format: {path}")]
    UnsupportedImage { path: PathBuf },

    /// The session was already closed.
    #[error("Document session is closed")]
    Closed,
}

impl EngineError {
    /// Create an open failure.
    pub fn open_failed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::OpenFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create a malformed XML error.
    pub fn malformed_xml(part: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedXml {
            part: part.into(),
            message: message.into(),
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_names_operation() {
        let err = EngineError::io(
            "reading photo",
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        let msg = err.to_string();
        assert!(msg.contains("reading photo"));
        assert!(msg.contains("gone"));
    }
}
