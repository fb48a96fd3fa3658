//! Centralized error types for mimetree.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mimetree library.
///
/// Structural problems in a message (missing blank line, missing boundary,
/// unterminated multipart) never surface here: the decoder degrades to the
/// most conservative interpretation instead. Errors are reserved for payload
/// decoding, which callers hit one accessor at a time.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// The character set name is not known to the text codec.
    #[error("Unsupported charset: {0}")]
    UnsupportedCharset(String),

    /// A base64 payload (encoded-word or body) is malformed.
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// An RFC 2047 encoded-word payload is malformed.
    #[error("Invalid encoded-word: {0}")]
    InvalidEncodedWord(String),

    /// An export operation failed.
    #[error("Export error: {0}")]
    Export(String),

    /// An invalid path was provided.
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (prefer `Error::io`).
impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
