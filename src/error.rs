//! Error types for rodgate
//!
//! Every failure that can reach a command handler, whether raised while
//! decoding a frame, by a store call, or delivered by an async completion,
//! is a [`HotRodError`]. The error classifier turns it into a status code and
//! a message; nothing here decides what the client sees.

use crate::protocol::RequestHeader;
use std::error::Error as StdError;
use thiserror::Error;

/// A boxed, thread-safe error used as a nested cause.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result type alias using HotRodError
pub type Result<T> = std::result::Result<T, HotRodError>;

/// Failure taxonomy of the command-processing layer.
#[derive(Debug, Error)]
pub enum HotRodError {
    // -------------------------------------------------------------------------
    // Framing
    // -------------------------------------------------------------------------
    #[error("invalid magic byte or message id: {0}")]
    InvalidMagicId(String),

    #[error("unknown operation code {opcode:#04x}")]
    UnknownOperation {
        opcode: u8,
        header: Box<RequestHeader>,
    },

    #[error("unknown protocol version {version}")]
    UnknownVersion {
        version: u8,
        header: Box<RequestHeader>,
    },

    // -------------------------------------------------------------------------
    // Request parsing
    // -------------------------------------------------------------------------
    #[error("{message}")]
    RequestParsing {
        message: String,
        header: Option<Box<RequestHeader>>,
        #[source]
        cause: Option<BoxError>,
    },

    /// The request named a cache this endpoint does not define
    #[error("cache with name '{cache_name}' not found")]
    CacheNotFound {
        cache_name: String,
        header: Box<RequestHeader>,
    },

    // -------------------------------------------------------------------------
    // Runtime
    // -------------------------------------------------------------------------
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("illegal lifecycle state: {0}")]
    IllegalLifecycle(String),

    /// The operation or option is recognised but not implemented
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// A failure delivered through an async completion
    #[error("completion failed")]
    Completion(#[source] Option<Box<HotRodError>>),

    #[error("{message}")]
    Server {
        message: String,
        #[source]
        cause: Option<BoxError>,
    },
}

impl HotRodError {
    pub fn parsing(message: impl Into<String>, header: Option<RequestHeader>) -> Self {
        HotRodError::RequestParsing {
            message: message.into(),
            header: header.map(Box::new),
            cause: None,
        }
    }

    pub fn parsing_with_cause(
        message: impl Into<String>,
        header: Option<RequestHeader>,
        cause: impl Into<BoxError>,
    ) -> Self {
        HotRodError::RequestParsing {
            message: message.into(),
            header: header.map(Box::new),
            cause: Some(cause.into()),
        }
    }

    pub fn server(message: impl Into<String>) -> Self {
        HotRodError::Server {
            message: message.into(),
            cause: None,
        }
    }

    pub fn server_with_cause(message: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        HotRodError::Server {
            message: message.into(),
            cause: Some(cause.into()),
        }
    }

    /// Wraps a failure that arrived through an async completion.
    pub fn completion(inner: HotRodError) -> Self {
        HotRodError::Completion(Some(Box::new(inner)))
    }

    /// The request header this failure carries, if it was raised while the
    /// header was known.
    pub fn carried_header(&self) -> Option<&RequestHeader> {
        match self {
            HotRodError::UnknownOperation { header, .. }
            | HotRodError::UnknownVersion { header, .. }
            | HotRodError::CacheNotFound { header, .. } => Some(header),
            HotRodError::RequestParsing { header, .. } => header.as_deref(),
            _ => None,
        }
    }
}
