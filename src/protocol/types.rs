//! Hot Rod Protocol Data Types
//!
//! This module defines the closed vocabularies of the Hot Rod binary protocol:
//! operation codes, response status codes, request flags and media types.
//!
//! ## Frame Prefixes
//!
//! Every request starts with the request magic byte and every response with
//! the response magic byte:
//! - `0xA0` Request
//! - `0xA1` Response
//!
//! ## Status Codes
//!
//! | Status                | Byte   |
//! |-----------------------|--------|
//! | Success               | `0x00` |
//! | NotExecuted           | `0x01` |
//! | KeyDoesNotExist       | `0x02` |
//! | InvalidMagicOrMsgId   | `0x81` |
//! | UnknownOperation      | `0x82` |
//! | UnknownVersion        | `0x83` |
//! | ParseError            | `0x84` |
//! | ServerError           | `0x85` |
//! | OperationTimedOut     | `0x86` |
//! | NodeSuspected         | `0x87` |
//! | IllegalLifecycleState | `0x88` |

use std::fmt;

/// Magic byte that opens every request frame
pub const REQUEST_MAGIC: u8 = 0xA0;

/// Magic byte that opens every response frame
pub const RESPONSE_MAGIC: u8 = 0xA1;

/// Oldest protocol version this endpoint understands (2.0)
pub const MIN_VERSION: u8 = 20;

/// Newest protocol version this endpoint understands (3.1)
pub const MAX_VERSION: u8 = 31;

/// Protocol versions from which requests carry key/value media types
pub const MEDIA_TYPE_VERSION: u8 = 28;

/// Protocol versions from which expiration is sent as a units byte
pub const EXPIRATION_UNITS_VERSION: u8 = 22;

/// Protocol versions from which iteration start carries the metadata flag
pub const ITERATION_METADATA_VERSION: u8 = 24;

/// Protocol versions from which ping responses describe the server
pub const PING_CAPABILITIES_VERSION: u8 = 30;

/// Client intelligence level of a basic client
pub const CLIENT_INTELLIGENCE_BASIC: u8 = 1;

/// Opcode written on every error response
pub const ERROR_RESPONSE_OPCODE: u8 = 0x50;

/// Hot Rod operations recognised by this endpoint.
///
/// Each variant carries its request opcode; the response opcode is always
/// the request opcode plus one, except for [`HotRodOperation::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HotRodOperation {
    Put,
    Get,
    Remove,
    Stats,
    Ping,
    Query,
    Exec,
    PutAll,
    IterationStart,
    IterationNext,
    IterationEnd,
    GetMultimap,
    PutMultimap,
    /// Synthetic operation of a header rebuilt for an error response
    Error,
}

impl HotRodOperation {
    /// Every operation that can arrive on the wire.
    pub const REQUESTS: [HotRodOperation; 13] = [
        HotRodOperation::Put,
        HotRodOperation::Get,
        HotRodOperation::Remove,
        HotRodOperation::Stats,
        HotRodOperation::Ping,
        HotRodOperation::Query,
        HotRodOperation::Exec,
        HotRodOperation::PutAll,
        HotRodOperation::IterationStart,
        HotRodOperation::IterationNext,
        HotRodOperation::IterationEnd,
        HotRodOperation::GetMultimap,
        HotRodOperation::PutMultimap,
    ];

    /// Looks up the operation for a request opcode.
    pub fn from_request_opcode(opcode: u8) -> Option<Self> {
        Self::REQUESTS
            .iter()
            .copied()
            .find(|op| op.request_opcode() == opcode)
    }

    pub fn request_opcode(&self) -> u8 {
        match self {
            HotRodOperation::Put => 0x01,
            HotRodOperation::Get => 0x03,
            HotRodOperation::Remove => 0x0B,
            HotRodOperation::Stats => 0x15,
            HotRodOperation::Ping => 0x17,
            HotRodOperation::Query => 0x1F,
            HotRodOperation::Exec => 0x2B,
            HotRodOperation::PutAll => 0x2D,
            HotRodOperation::IterationStart => 0x31,
            HotRodOperation::IterationNext => 0x33,
            HotRodOperation::IterationEnd => 0x35,
            HotRodOperation::GetMultimap => 0x67,
            HotRodOperation::PutMultimap => 0x6B,
            HotRodOperation::Error => ERROR_RESPONSE_OPCODE,
        }
    }

    pub fn response_opcode(&self) -> u8 {
        match self {
            HotRodOperation::Error => ERROR_RESPONSE_OPCODE,
            op => op.request_opcode() + 1,
        }
    }
}

impl fmt::Display for HotRodOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Status byte written on every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationStatus {
    Success,
    NotExecuted,
    KeyDoesNotExist,
    InvalidMagicOrMsgId,
    UnknownOperation,
    UnknownVersion,
    ParseError,
    ServerError,
    OperationTimedOut,
    NodeSuspected,
    IllegalLifecycleState,
}

impl OperationStatus {
    pub fn code(&self) -> u8 {
        match self {
            OperationStatus::Success => 0x00,
            OperationStatus::NotExecuted => 0x01,
            OperationStatus::KeyDoesNotExist => 0x02,
            OperationStatus::InvalidMagicOrMsgId => 0x81,
            OperationStatus::UnknownOperation => 0x82,
            OperationStatus::UnknownVersion => 0x83,
            OperationStatus::ParseError => 0x84,
            OperationStatus::ServerError => 0x85,
            OperationStatus::OperationTimedOut => 0x86,
            OperationStatus::NodeSuspected => 0x87,
            OperationStatus::IllegalLifecycleState => 0x88,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        let status = match code {
            0x00 => OperationStatus::Success,
            0x01 => OperationStatus::NotExecuted,
            0x02 => OperationStatus::KeyDoesNotExist,
            0x81 => OperationStatus::InvalidMagicOrMsgId,
            0x82 => OperationStatus::UnknownOperation,
            0x83 => OperationStatus::UnknownVersion,
            0x84 => OperationStatus::ParseError,
            0x85 => OperationStatus::ServerError,
            0x86 => OperationStatus::OperationTimedOut,
            0x87 => OperationStatus::NodeSuspected,
            0x88 => OperationStatus::IllegalLifecycleState,
            _ => return None,
        };
        Some(status)
    }

    /// Returns true for the statuses reported on error responses.
    pub fn is_error(&self) -> bool {
        self.code() >= 0x80
    }
}

/// Per-request flags, sent as a vint bitset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolFlag {
    ForceReturnPreviousValue,
    DefaultLifespan,
    DefaultMaxIdle,
    SkipCacheLoad,
    SkipIndexing,
}

impl ProtocolFlag {
    pub fn mask(&self) -> u32 {
        match self {
            ProtocolFlag::ForceReturnPreviousValue => 0x01,
            ProtocolFlag::DefaultLifespan => 0x02,
            ProtocolFlag::DefaultMaxIdle => 0x04,
            ProtocolFlag::SkipCacheLoad => 0x08,
            ProtocolFlag::SkipIndexing => 0x10,
        }
    }
}

/// A content type attached to keys or values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType(String);

impl MediaType {
    /// The wildcard type used when a client does not say
    pub const MATCH_ALL_TYPE: &'static str = "*/*";

    pub fn new(name: impl Into<String>) -> Self {
        MediaType(name.into())
    }

    pub fn match_all() -> Self {
        MediaType(Self::MATCH_ALL_TYPE.to_string())
    }

    /// Resolves one of the predefined media type ids.
    pub fn from_id(id: u32) -> Option<Self> {
        let name = match id {
            1 => "application/x-java-object",
            2 => "application/json",
            3 => "application/octet-stream",
            4 => "application/x-protostream",
            5 => "application/x-jboss-marshalling",
            6 => "text/plain",
            7 => "application/xml",
            8 => "application/x-www-form-urlencoded",
            9 => "application/unknown",
            10 => "application/x-java-serialized-object",
            _ => return None,
        };
        Some(MediaType::new(name))
    }

    /// Returns the predefined id of this type, if it has one.
    pub fn id(&self) -> Option<u32> {
        (1..=10).find(|id| MediaType::from_id(*id).as_ref() == Some(self))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_match_all(&self) -> bool {
        self.0 == Self::MATCH_ALL_TYPE
    }
}

impl Default for MediaType {
    fn default() -> Self {
        Self::match_all()
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
