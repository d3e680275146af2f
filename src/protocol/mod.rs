//! Hot Rod Protocol Implementation
//!
//! This module provides the binary framing of the Hot Rod cache protocol.
//!
//! ## Overview
//!
//! Hot Rod is a binary request/response protocol. Every frame starts with a
//! magic byte and a client-chosen message id, which the server echoes so a
//! client can match responses to requests.
//!
//! ## Modules
//!
//! - `types`: operation codes, status codes, flags and media types
//! - `header`: the per-request header and its error-path reconstruction
//! - `varint`: variable-length integers and length-prefixed fields
//! - `decoder`: incremental request decoder
//! - `encoder`: response frame builders
//!
//! ## Example
//!
//! ```ignore
//! use rodgate::protocol::{RequestDecoder, RequestHeader, OperationStatus};
//!
//! let decoder = RequestDecoder::default();
//! if let Some((request, consumed)) = decoder.decode(&buffer)? {
//!     let header = request.header();
//!     let response = header.encoder().empty_response(header, OperationStatus::Success);
//! }
//! ```

pub mod decoder;
pub mod encoder;
pub mod header;
pub mod types;
pub mod varint;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types for convenience
pub use decoder::{Request, RequestDecoder, DEFAULT_MAX_FRAME_SIZE};
pub use encoder::{encoder_for, HotRodEncoder, ResponseEncoder};
pub use header::RequestHeader;
pub use types::{HotRodOperation, MediaType, OperationStatus, ProtocolFlag};
