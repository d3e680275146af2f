//! Client-side response decoding used by the unit tests.

use crate::protocol::types::{OperationStatus, RESPONSE_MAGIC};
use crate::protocol::varint::FrameReader;
use bytes::Bytes;

const MAX_TEST_ARRAY: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedResponse {
    pub message_id: u64,
    pub opcode: u8,
    pub status: OperationStatus,
    pub body: Bytes,
}

impl DecodedResponse {
    pub fn value(&self) -> Option<Bytes> {
        FrameReader::new(&self.body).read_array(MAX_TEST_ARRAY).ok()
    }

    pub fn collection(&self) -> Option<Vec<Bytes>> {
        let mut reader = FrameReader::new(&self.body);
        let count = reader.read_vint().ok()?;
        (0..count)
            .map(|_| reader.read_array(MAX_TEST_ARRAY).ok())
            .collect()
    }

    pub fn error_message(&self) -> Option<String> {
        FrameReader::new(&self.body).read_string(MAX_TEST_ARRAY).ok()
    }
}

/// Decodes one complete response frame, panicking on malformed input.
pub fn decode_response(buf: &[u8]) -> DecodedResponse {
    let mut reader = FrameReader::new(buf);
    assert_eq!(reader.read_u8().unwrap(), RESPONSE_MAGIC);
    let message_id = reader.read_vlong().unwrap();
    let opcode = reader.read_u8().unwrap();
    let status = OperationStatus::from_code(reader.read_u8().unwrap()).unwrap();
    assert_eq!(reader.read_u8().unwrap(), 0, "unexpected topology change");
    DecodedResponse {
        message_id,
        opcode,
        status,
        body: Bytes::copy_from_slice(&buf[reader.position()..]),
    }
}
