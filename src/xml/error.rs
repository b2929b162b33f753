//! Error types for XML document handling.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or writing XML documents.
#[derive(Debug, Error)]
pub enum XmlError {
    /// The input is not well-formed XML.
    #[error("malformed XML in {origin}: {source}")]
    Parse {
        /// Where the document came from (file path, zip entry or "string").
        origin: String,
        /// The underlying parser error.
        #[source]
        source: xmltree::ParseError,
    },

    /// Serializing a document failed.
    #[error("failed to serialize XML: {message}")]
    Write {
        /// Emitter error description.
        message: String,
    },

    /// File system error reading or writing a document.
    #[error("IO error on {path}: {source}")]
    Io {
        /// Path of the document.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Zip archive could not be read or written.
    #[error("zip error on {path}: {source}")]
    Zip {
        /// Path of the archive.
        path: PathBuf,
        /// The underlying zip error.
        #[source]
        source: zip::result::ZipError,
    },

    /// The archive does not contain the expected document entry.
    #[error("zip archive {path} has no entry named '{entry}'")]
    MissingEntry {
        /// Path of the archive.
        path: PathBuf,
        /// The entry that was looked up.
        entry: String,
    },
}

impl XmlError {
    /// Creates a parse error for the given origin.
    pub fn parse(origin: impl Into<String>, source: xmltree::ParseError) -> Self {
        Self::Parse {
            origin: origin.into(),
            source,
        }
    }

    /// Creates a serialization error from any emitter error.
    pub fn write(error: impl std::fmt::Display) -> Self {
        Self::Write {
            message: error.to_string(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a zip error.
    pub fn zip(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::Zip {
            path: path.into(),
            source,
        }
    }
}
