//! Incremental Hot Rod Request Decoder
//!
//! The decoder reads from a buffer and returns either:
//! - `Ok(Some((request, consumed)))` - a whole frame was decoded, `consumed` bytes were used
//! - `Ok(None)` - the frame is incomplete, wait for more data
//! - `Err(HotRodError)` - the bytes can never form a valid frame
//!
//! ## Request Header
//!
//! ```text
//! magic(0xA0) | message id (vlong) | version | opcode | cache name (string)
//!   | flags (vint) | client intelligence | topology id (vint)
//!   | key media type | value media type          (version >= 28 only)
//! ```
//!
//! Decode failures carry as much of the header as was read, so the error
//! response can still echo the client's message id.

use crate::error::HotRodError;
use crate::protocol::header::RequestHeader;
use crate::protocol::types::{
    HotRodOperation, MediaType, EXPIRATION_UNITS_VERSION, ITERATION_METADATA_VERSION,
    MAX_VERSION, MEDIA_TYPE_VERSION, MIN_VERSION, REQUEST_MAGIC,
};
use crate::protocol::varint::{FrameReader, ReadError};
use bytes::Bytes;
use std::collections::HashMap;

/// Default upper bound for one request frame (64 MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Expiration unit meaning "use the cache default"
const UNIT_DEFAULT: u8 = 0x07;

/// Expiration unit meaning "never expire"
const UNIT_INFINITE: u8 = 0x08;

/// A fully decoded request, one variant per operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Put {
        header: RequestHeader,
        key: Bytes,
        value: Bytes,
    },
    Get {
        header: RequestHeader,
        key: Bytes,
    },
    Remove {
        header: RequestHeader,
        key: Bytes,
    },
    PutAll {
        header: RequestHeader,
        entries: Vec<(Bytes, Bytes)>,
    },
    Ping {
        header: RequestHeader,
    },
    Stats {
        header: RequestHeader,
    },
    Query {
        header: RequestHeader,
        query: Bytes,
    },
    Exec {
        header: RequestHeader,
        task: String,
        params: HashMap<String, Bytes>,
    },
    IterationStart {
        header: RequestHeader,
        segment_mask: Bytes,
        filter_converter_factory: String,
        filter_converter_params: Vec<Bytes>,
        batch_size: u32,
        include_metadata: bool,
    },
    IterationNext {
        header: RequestHeader,
        iteration_id: String,
    },
    IterationEnd {
        header: RequestHeader,
        iteration_id: String,
    },
    GetMultimap {
        header: RequestHeader,
        key: Bytes,
    },
    PutMultimap {
        header: RequestHeader,
        key: Bytes,
        value: Bytes,
    },
}

impl Request {
    pub fn header(&self) -> &RequestHeader {
        match self {
            Request::Put { header, .. }
            | Request::Get { header, .. }
            | Request::Remove { header, .. }
            | Request::PutAll { header, .. }
            | Request::Ping { header }
            | Request::Stats { header }
            | Request::Query { header, .. }
            | Request::Exec { header, .. }
            | Request::IterationStart { header, .. }
            | Request::IterationNext { header, .. }
            | Request::IterationEnd { header, .. }
            | Request::GetMultimap { header, .. }
            | Request::PutMultimap { header, .. } => header,
        }
    }
}

/// Decodes request frames from a connection's read buffer.
#[derive(Debug, Clone, Copy)]
pub struct RequestDecoder {
    max_frame_size: usize,
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl RequestDecoder {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Attempts to decode one request from the front of `buf`.
    pub fn decode(&self, buf: &[u8]) -> Result<Option<(Request, usize)>, HotRodError> {
        if buf.is_empty() {
            return Ok(None);
        }

        let mut reader = FrameReader::new(buf);
        let header = match self.read_header(&mut reader) {
            Ok(header) => header,
            Err(Incomplete) => return self.incomplete(buf, None),
            Err(Fatal(err)) => return Err(err),
        };

        match self.read_body(&mut reader, header.clone()) {
            Ok(request) => Ok(Some((request, reader.position()))),
            Err(ReadError::Incomplete) => self.incomplete(buf, Some(header)),
            Err(ReadError::Invalid(reason)) => Err(HotRodError::parsing_with_cause(
                format!("Unable to decode {} request", header.operation),
                Some(header),
                reason,
            )),
        }
    }

    fn incomplete(
        &self,
        buf: &[u8],
        header: Option<RequestHeader>,
    ) -> Result<Option<(Request, usize)>, HotRodError> {
        if buf.len() >= self.max_frame_size {
            return Err(HotRodError::parsing(
                format!(
                    "request frame exceeds the maximum size of {} bytes",
                    self.max_frame_size
                ),
                header,
            ));
        }
        Ok(None)
    }

    fn read_header(&self, reader: &mut FrameReader<'_>) -> Result<RequestHeader, HeaderError> {
        let magic = reader.read_u8()?;
        if magic != REQUEST_MAGIC {
            return Err(Fatal(HotRodError::InvalidMagicId(format!(
                "expected {:#04x} but got {:#04x}",
                REQUEST_MAGIC, magic
            ))));
        }

        let message_id = reader.read_vlong()?;
        let version = reader.read_u8()?;
        if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
            return Err(Fatal(HotRodError::UnknownVersion {
                version,
                header: Box::new(RequestHeader::new(
                    HotRodOperation::Error,
                    version,
                    message_id,
                    "",
                )),
            }));
        }

        let opcode = reader.read_u8()?;
        let cache_name = reader.read_string(self.max_frame_size)?;
        let mut header = RequestHeader::new(HotRodOperation::Error, version, message_id, cache_name);
        header.flags = reader.read_vint()?;
        header.client_intelligence = reader.read_u8()?;
        header.topology_id = reader.read_vint()?;

        if version >= MEDIA_TYPE_VERSION {
            header.key_media_type = self.read_media_type(reader, &header)?;
            header.value_media_type = self.read_media_type(reader, &header)?;
        }

        match HotRodOperation::from_request_opcode(opcode) {
            Some(operation) => {
                header.operation = operation;
                Ok(header)
            }
            None => Err(Fatal(HotRodError::UnknownOperation {
                opcode,
                header: Box::new(header),
            })),
        }
    }

    fn read_media_type(
        &self,
        reader: &mut FrameReader<'_>,
        header: &RequestHeader,
    ) -> Result<MediaType, HeaderError> {
        match reader.read_u8()? {
            0 => Ok(MediaType::match_all()),
            1 => {
                let id = reader.read_vint()?;
                MediaType::from_id(id).ok_or_else(|| {
                    Fatal(HotRodError::parsing(
                        format!("unknown media type id {}", id),
                        Some(header.clone()),
                    ))
                })
            }
            2 => {
                let name = reader.read_string(self.max_frame_size)?;
                // parameters do not affect how this endpoint stores data
                let params = reader.read_vint()?;
                for _ in 0..params {
                    reader.read_string(self.max_frame_size)?;
                    reader.read_string(self.max_frame_size)?;
                }
                Ok(MediaType::new(name))
            }
            other => Err(Fatal(HotRodError::parsing(
                format!("unknown media type marker {}", other),
                Some(header.clone()),
            ))),
        }
    }

    fn read_body(
        &self,
        reader: &mut FrameReader<'_>,
        header: RequestHeader,
    ) -> Result<Request, ReadError> {
        let max = self.max_frame_size;
        let request = match header.operation {
            HotRodOperation::Put => {
                let key = reader.read_array(max)?;
                read_expiration(reader, header.version)?;
                let value = reader.read_array(max)?;
                Request::Put { header, key, value }
            }
            HotRodOperation::Get => Request::Get {
                key: reader.read_array(max)?,
                header,
            },
            HotRodOperation::Remove => Request::Remove {
                key: reader.read_array(max)?,
                header,
            },
            HotRodOperation::PutAll => {
                read_expiration(reader, header.version)?;
                let count = reader.read_vint()?;
                let mut entries = Vec::with_capacity((count as usize).min(1024));
                for _ in 0..count {
                    let key = reader.read_array(max)?;
                    let value = reader.read_array(max)?;
                    entries.push((key, value));
                }
                Request::PutAll { header, entries }
            }
            HotRodOperation::Ping => Request::Ping { header },
            HotRodOperation::Stats => Request::Stats { header },
            HotRodOperation::Query => Request::Query {
                query: reader.read_array(max)?,
                header,
            },
            HotRodOperation::Exec => {
                let task = reader.read_string(max)?;
                let count = reader.read_vint()?;
                let mut params = HashMap::new();
                for _ in 0..count {
                    let name = reader.read_string(max)?;
                    let value = reader.read_array(max)?;
                    params.insert(name, value);
                }
                Request::Exec {
                    header,
                    task,
                    params,
                }
            }
            HotRodOperation::IterationStart => {
                let segment_mask = reader.read_array(max)?;
                let filter_converter_factory = reader.read_string(max)?;
                let mut filter_converter_params = Vec::new();
                if !filter_converter_factory.is_empty() {
                    let count = reader.read_u8()?;
                    for _ in 0..count {
                        filter_converter_params.push(reader.read_array(max)?);
                    }
                }
                let batch_size = reader.read_vint()?;
                let include_metadata = if header.version >= ITERATION_METADATA_VERSION {
                    reader.read_u8()? != 0
                } else {
                    false
                };
                Request::IterationStart {
                    header,
                    segment_mask,
                    filter_converter_factory,
                    filter_converter_params,
                    batch_size,
                    include_metadata,
                }
            }
            HotRodOperation::IterationNext => Request::IterationNext {
                iteration_id: reader.read_string(max)?,
                header,
            },
            HotRodOperation::IterationEnd => Request::IterationEnd {
                iteration_id: reader.read_string(max)?,
                header,
            },
            HotRodOperation::GetMultimap => Request::GetMultimap {
                key: reader.read_array(max)?,
                header,
            },
            HotRodOperation::PutMultimap => {
                let key = reader.read_array(max)?;
                read_expiration(reader, header.version)?;
                let value = reader.read_array(max)?;
                Request::PutMultimap { header, key, value }
            }
            HotRodOperation::Error => {
                return Err(ReadError::Invalid("error is not a request operation".into()))
            }
        };
        Ok(request)
    }
}

/// Skips the lifespan and max-idle of a write; this endpoint keeps no TTLs.
fn read_expiration(reader: &mut FrameReader<'_>, version: u8) -> Result<(), ReadError> {
    if version < EXPIRATION_UNITS_VERSION {
        reader.read_vint()?;
        reader.read_vint()?;
        return Ok(());
    }

    let units = reader.read_u8()?;
    for unit in [units >> 4, units & 0x0F] {
        match unit {
            UNIT_DEFAULT | UNIT_INFINITE => {}
            0..=6 => {
                reader.read_vlong()?;
            }
            other => {
                return Err(ReadError::Invalid(format!(
                    "unknown expiration time unit {:#x}",
                    other
                )))
            }
        }
    }
    Ok(())
}

/// Outcome of a failed header read.
enum HeaderError {
    Incomplete,
    Fatal(HotRodError),
}

use HeaderError::{Fatal, Incomplete};

impl From<ReadError> for HeaderError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::Incomplete => Incomplete,
            ReadError::Invalid(reason) => Fatal(HotRodError::parsing(reason, None)),
        }
    }
}
