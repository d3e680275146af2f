//! Request Header
//!
//! Per-request metadata decoded from the front of every Hot Rod frame. A
//! header is immutable once built; error paths never patch one in place but
//! derive a fresh error header from it (see [`RequestHeader::to_error_header`]).

use crate::protocol::encoder::{encoder_for, ResponseEncoder};
use crate::protocol::types::{
    HotRodOperation, MediaType, ProtocolFlag, CLIENT_INTELLIGENCE_BASIC,
};

/// Metadata of one request, plus access to the encoder for its version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    pub operation: HotRodOperation,
    pub version: u8,
    pub message_id: u64,
    pub cache_name: String,
    pub flags: u32,
    pub client_intelligence: u8,
    pub topology_id: u32,
    pub key_media_type: MediaType,
    pub value_media_type: MediaType,
}

impl RequestHeader {
    /// Creates a header with default flags, intelligence and media types.
    pub fn new(
        operation: HotRodOperation,
        version: u8,
        message_id: u64,
        cache_name: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            version,
            message_id,
            cache_name: cache_name.into(),
            flags: 0,
            client_intelligence: CLIENT_INTELLIGENCE_BASIC,
            topology_id: 0,
            key_media_type: MediaType::match_all(),
            value_media_type: MediaType::match_all(),
        }
    }

    /// The header used for an error response when no request header could
    /// be decoded at all.
    pub fn neutral() -> Self {
        Self::new(HotRodOperation::Error, 1, 0, "")
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_media_types(mut self, key: MediaType, value: MediaType) -> Self {
        self.key_media_type = key;
        self.value_media_type = value;
        self
    }

    pub fn has_flag(&self, flag: ProtocolFlag) -> bool {
        self.flags & flag.mask() != 0
    }

    /// Copies every operation-independent field into a new error header.
    pub fn to_error_header(&self) -> Self {
        Self {
            operation: HotRodOperation::Error,
            ..self.clone()
        }
    }

    /// The encoder that speaks this header's protocol version.
    pub fn encoder(&self) -> &'static dyn ResponseEncoder {
        encoder_for(self.version)
    }
}
