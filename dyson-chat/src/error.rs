//! Error types for chat requests and the saved-chat library.

use thiserror::Error;

/// Failure talking to the chat service.
#[derive(Error, Debug)]
pub enum ChatError {
    /// The request could not be sent or the connection failed.
    #[error("request to chat service failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("chat service returned {0}")]
    Status(reqwest::StatusCode),
}

/// Failure reading or writing the saved-chat library.
#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed saved chat {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("saved chat not found: {0}")]
    NotFound(String),
}

impl LibraryError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
