//! Error types for the mock server.

use std::net::SocketAddr;
use thiserror::Error;

use crate::parser::Error as ParserError;

/// Errors that can occur during mock server operation.
#[derive(Debug, Error)]
pub enum Error {
    /// Error parsing an HTTP request.
    #[error("Parse error: {0}")]
    ParseError(#[from] ParserError),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// `listen` was called on a server that is already listening.
    #[error("Already listening")]
    AlreadyListening,

    /// The listening socket could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// A request arrived while the handler queue was empty.
    ///
    /// The text (lowercase `handler`, trailing period) is what clients of the
    /// mock match on in the 500 body; keep it stable.
    #[error("Missing handler.")]
    MissingHandler,

    /// A handler returned an error or panicked.
    #[error("{0}")]
    HandlerFault(String),

    /// Internal server error.
    #[error("Internal server error: {0}")]
    InternalError(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
