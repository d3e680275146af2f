//! Hot Rod Response Encoder
//!
//! Builds ready-to-send response frames. Every response starts with the same
//! header:
//!
//! ```text
//! ┌───────┬────────────┬─────────────┬────────┬─────────────────┐
//! │ magic │ message id │ response op │ status │ topology marker │
//! │ 0xA1  │   vlong    │    byte     │  byte  │      byte       │
//! └───────┴────────────┴─────────────┴────────┴─────────────────┘
//! ```
//!
//! followed by an operation-specific body.

use crate::error::HotRodError;
use crate::protocol::header::RequestHeader;
use crate::protocol::types::{
    HotRodOperation, MediaType, OperationStatus, MAX_VERSION, PING_CAPABILITIES_VERSION,
    RESPONSE_MAGIC,
};
use crate::protocol::varint::{write_array, write_string, write_vint, write_vlong};
use bytes::{BufMut, Bytes, BytesMut};

/// Topology change marker: this endpoint never ships topology updates
const NO_TOPOLOGY_CHANGE: u8 = 0;

/// Builds response frames for one protocol version.
pub trait ResponseEncoder: Send + Sync {
    /// A response with a status and no body.
    fn empty_response(&self, header: &RequestHeader, status: OperationStatus) -> Bytes;

    /// A response telling the client the key does not exist.
    fn not_exist_response(&self, header: &RequestHeader) -> Bytes;

    /// A response carrying one value.
    fn value_response(&self, header: &RequestHeader, status: OperationStatus, value: &[u8])
        -> Bytes;

    /// A response carrying an ordered collection of values.
    fn collection_response(
        &self,
        header: &RequestHeader,
        status: OperationStatus,
        values: &[Bytes],
    ) -> Bytes;

    fn ping_response(&self, header: &RequestHeader, status: OperationStatus) -> Bytes;

    fn error_response(&self, header: &RequestHeader, message: &str, status: OperationStatus)
        -> Bytes;

    /// Maps a failure the classifier could not place onto a status code.
    fn error_status(&self, error: &HotRodError) -> OperationStatus;
}

/// Encoder for protocol versions 2.x and 3.x.
#[derive(Debug, Default, Clone, Copy)]
pub struct HotRodEncoder;

static HOT_ROD_ENCODER: HotRodEncoder = HotRodEncoder;

/// Returns the encoder for a protocol version.
///
/// Every supported version shares one frame layout; the version-dependent
/// parts are decided per header inside the encoder.
pub fn encoder_for(_version: u8) -> &'static dyn ResponseEncoder {
    &HOT_ROD_ENCODER
}

impl HotRodEncoder {
    fn write_header(&self, buf: &mut BytesMut, header: &RequestHeader, status: OperationStatus) {
        buf.put_u8(RESPONSE_MAGIC);
        write_vlong(buf, header.message_id);
        buf.put_u8(header.operation.response_opcode());
        buf.put_u8(status.code());
        buf.put_u8(NO_TOPOLOGY_CHANGE);
    }

    fn start(&self, header: &RequestHeader, status: OperationStatus, body_hint: usize) -> BytesMut {
        let mut buf = BytesMut::with_capacity(16 + body_hint);
        self.write_header(&mut buf, header, status);
        buf
    }

    fn write_media_type(&self, buf: &mut BytesMut, media_type: &MediaType) {
        if media_type.is_match_all() {
            buf.put_u8(0);
        } else if let Some(id) = media_type.id() {
            buf.put_u8(1);
            write_vint(buf, id);
        } else {
            buf.put_u8(2);
            write_string(buf, media_type.as_str());
            write_vint(buf, 0);
        }
    }
}

impl ResponseEncoder for HotRodEncoder {
    fn empty_response(&self, header: &RequestHeader, status: OperationStatus) -> Bytes {
        self.start(header, status, 0).freeze()
    }

    fn not_exist_response(&self, header: &RequestHeader) -> Bytes {
        self.empty_response(header, OperationStatus::KeyDoesNotExist)
    }

    fn value_response(
        &self,
        header: &RequestHeader,
        status: OperationStatus,
        value: &[u8],
    ) -> Bytes {
        let mut buf = self.start(header, status, value.len() + 5);
        write_array(&mut buf, value);
        buf.freeze()
    }

    fn collection_response(
        &self,
        header: &RequestHeader,
        status: OperationStatus,
        values: &[Bytes],
    ) -> Bytes {
        let body: usize = values.iter().map(|v| v.len() + 5).sum();
        let mut buf = self.start(header, status, body + 5);
        write_vint(&mut buf, values.len() as u32);
        for value in values {
            write_array(&mut buf, value);
        }
        buf.freeze()
    }

    fn ping_response(&self, header: &RequestHeader, status: OperationStatus) -> Bytes {
        let mut buf = self.start(header, status, 64);
        if header.version >= PING_CAPABILITIES_VERSION {
            self.write_media_type(&mut buf, &header.key_media_type);
            self.write_media_type(&mut buf, &header.value_media_type);
            buf.put_u8(MAX_VERSION);
            write_vint(&mut buf, HotRodOperation::REQUESTS.len() as u32);
            for op in HotRodOperation::REQUESTS {
                buf.put_u16(op.request_opcode() as u16);
            }
        }
        buf.freeze()
    }

    fn error_response(
        &self,
        header: &RequestHeader,
        message: &str,
        status: OperationStatus,
    ) -> Bytes {
        let mut buf = self.start(header, status, message.len() + 5);
        write_string(&mut buf, message);
        buf.freeze()
    }

    fn error_status(&self, error: &HotRodError) -> OperationStatus {
        match error {
            HotRodError::IllegalLifecycle(_) => OperationStatus::IllegalLifecycleState,
            HotRodError::Timeout(_) => OperationStatus::OperationTimedOut,
            _ => OperationStatus::ServerError,
        }
    }
}
