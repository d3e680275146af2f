//! Connection Handler Module
//!
//! This module handles individual client connections to rodgate.
//! Each client gets a reader task that decodes and dispatches requests and a
//! writer task that sends responses back.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned, socket split in two
//!        │
//!        ├──────────────────────────────┐
//!        ▼                              ▼
//! 3. ┌─────────────────────────┐   ┌─────────────────────────┐
//!    │   Reader (main loop)    │   │      Writer task        │
//!    │                         │   │                         │
//!    │ read bytes from socket  │   │ await next slot         │
//!    │ decode Hot Rod frame    │   │ (in request order)      │
//!    │ queue response slot ────┼──>│ write + flush           │
//!    │ dispatch request        │   │                         │
//!    └─────────────────────────┘   └─────────────────────────┘
//!        │
//!        ▼
//! 4. Client disconnects / malformed frame
//!        │
//!        ▼
//! 5. Writer drains queued responses, handler ends
//! ```
//!
//! ## Response Ordering
//!
//! `get` answers from another task, possibly after later requests have been
//! answered. Slots are queued in the order requests are decoded and the
//! writer awaits them in that order, so responses leave the socket in
//! request order. The slot queue is bounded, so a client that pipelines
//! behind a slow request stops being read until responses drain.

use crate::commands::{write_exception, CommandProcessor, ResponseSlot, ResponseWriter};
use crate::error::HotRodError;
use crate::protocol::{Request, RequestDecoder};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Responses a connection may have outstanding before it stops reading
const MAX_PENDING_RESPONSES: usize = 1024;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total requests dispatched
    pub requests_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn request_processed(&self) {
        self.requests_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
pub struct ConnectionHandler {
    /// Read half of the TCP stream
    reader: OwnedReadHalf,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// The command processor (shared across connections)
    processor: CommandProcessor,

    decoder: RequestDecoder,

    /// Response slots, in request order, for the writer task
    slots: mpsc::Sender<ResponseSlot>,

    writer_task: JoinHandle<Result<(), ConnectionError>>,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    /// Creates a new connection handler and starts its writer task.
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        processor: CommandProcessor,
        decoder: RequestDecoder,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        let (reader, writer) = stream.into_split();
        let (slots, queued) = mpsc::channel(MAX_PENDING_RESPONSES);
        let writer_task = tokio::spawn(write_loop(
            BufWriter::new(writer),
            queued,
            addr,
            Arc::clone(&stats),
        ));

        Self {
            reader,
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            processor,
            decoder,
            slots,
            writer_task,
            stats,
        }
    }

    /// Runs the connection until the client disconnects or sends a frame
    /// that cannot be decoded, then waits for queued responses to be sent.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected gracefully"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    debug!(client = %self.addr, "Client disconnected")
                }
                ConnectionError::IoError(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                _ => warn!(client = %self.addr, error = %e, "Connection error"),
            },
        }

        let ConnectionHandler {
            addr,
            slots,
            writer_task,
            stats,
            ..
        } = self;
        drop(slots);
        match writer_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(client = %addr, error = %e, "Writer stopped early"),
            Err(e) => warn!(client = %addr, error = %e, "Writer task failed"),
        }

        stats.connection_closed();
        result
    }

    /// The main read-decode-dispatch loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            loop {
                match self.try_decode_request() {
                    Ok(Some(request)) => {
                        let (writer, slot) = ResponseWriter::channel();
                        self.queue(slot).await?;
                        self.processor.dispatch(request, writer);
                        self.stats.request_processed();
                    }
                    Ok(None) => break,
                    Err(e) => {
                        // The stream cannot be resynchronised after a bad frame
                        let (writer, slot) = ResponseWriter::channel();
                        self.queue(slot).await?;
                        write_exception(None, &e, writer);
                        return Err(ConnectionError::Decode(e));
                    }
                }
            }

            // Need more data - read from the socket
            self.read_more_data().await?;
        }
    }

    /// Attempts to decode a request from the buffer.
    fn try_decode_request(&mut self) -> Result<Option<Request>, HotRodError> {
        match self.decoder.decode(&self.buffer) {
            Ok(Some((request, consumed))) => {
                let _ = self.buffer.split_to(consumed);
                trace!(
                    client = %self.addr,
                    consumed = consumed,
                    remaining = self.buffer.len(),
                    "Decoded request"
                );
                Ok(Some(request))
            }
            Ok(None) => {
                trace!(
                    client = %self.addr,
                    buffered = self.buffer.len(),
                    "Incomplete request, need more data"
                );
                Ok(None)
            }
            Err(e) => {
                warn!(client = %self.addr, error = %e, "Malformed request");
                Err(e)
            }
        }
    }

    /// Hands a slot to the writer, waiting while the queue is full.
    async fn queue(&self, slot: ResponseSlot) -> Result<(), ConnectionError> {
        self.slots
            .send(slot)
            .await
            .map_err(|_| ConnectionError::WriterClosed)
    }

    /// Reads more data from the socket into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        // Ensure we have some capacity
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(4096);
        }

        let n = self.reader.read_buf(&mut self.buffer).await?;

        if n == 0 {
            // Connection closed by client
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            } else {
                // Partial request in buffer
                return Err(ConnectionError::UnexpectedEof);
            }
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }
}

/// Writes responses in the order their slots were queued.
async fn write_loop(
    mut stream: BufWriter<OwnedWriteHalf>,
    mut queued: mpsc::Receiver<ResponseSlot>,
    addr: SocketAddr,
    stats: Arc<ConnectionStats>,
) -> Result<(), ConnectionError> {
    while let Some(slot) = queued.recv().await {
        let Ok(bytes) = slot.await else {
            warn!(client = %addr, "Request finished without a response");
            continue;
        };

        stream.write_all(&bytes).await?;
        stream.flush().await?;
        stats.bytes_written(bytes.len());
        trace!(client = %addr, bytes = bytes.len(), "Sent response");
    }
    stream.flush().await?;
    Ok(())
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The client sent a frame that could not be decoded
    #[error("Decode error: {0}")]
    Decode(HotRodError),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Unexpected end of stream (partial request)
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// The writer task is gone, responses can no longer be delivered
    #[error("Response writer closed")]
    WriterClosed,
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    processor: CommandProcessor,
    decoder: RequestDecoder,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, processor, decoder, stats);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::IoError(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decoder::tests::{key_frame, put_frame, request_header};
    use crate::protocol::testing::decode_response;
    use crate::protocol::{encoder_for, HotRodOperation, OperationStatus, RequestHeader};
    use crate::storage::{MultimapStore, StorageEngine};
    use bytes::Bytes;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::time::{timeout, Duration};

    async fn create_test_server() -> (SocketAddr, Arc<StorageEngine>, Arc<ConnectionStats>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let storage = Arc::new(StorageEngine::new());
        let stats = Arc::new(ConnectionStats::new());

        let processor = CommandProcessor::new(storage.clone(), Arc::new(MultimapStore::new()));
        let stats_clone = Arc::clone(&stats);

        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                let processor = processor.clone();
                let stats = Arc::clone(&stats_clone);
                tokio::spawn(handle_connection(
                    stream,
                    client_addr,
                    processor,
                    RequestDecoder::default(),
                    stats,
                ));
            }
        });

        (addr, storage, stats)
    }

    fn success(op: HotRodOperation, message_id: u64) -> Bytes {
        let header = RequestHeader::new(op, 30, message_id, "c");
        encoder_for(30).empty_response(&header, OperationStatus::Success)
    }

    fn value(message_id: u64, v: &str) -> Bytes {
        let header = RequestHeader::new(HotRodOperation::Get, 30, message_id, "c");
        encoder_for(30).value_response(&header, OperationStatus::Success, v.as_bytes())
    }

    fn not_found(message_id: u64) -> Bytes {
        let header = RequestHeader::new(HotRodOperation::Get, 30, message_id, "c");
        encoder_for(30).not_exist_response(&header)
    }

    async fn read_exactly(client: &mut TcpStream, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        timeout(Duration::from_secs(2), client.read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();
        buf
    }

    #[tokio::test]
    async fn test_ping() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        let mut frame = BytesMut::new();
        request_header(&mut frame, HotRodOperation::Ping, 30, 1, "", 0);
        client.write_all(&frame).await.unwrap();

        let header = RequestHeader::new(HotRodOperation::Ping, 30, 1, "");
        let expected = encoder_for(30).ping_response(&header, OperationStatus::Success);
        assert_eq!(read_exactly(&mut client, expected.len()).await, expected);
    }

    #[tokio::test]
    async fn test_put_get() {
        let (addr, storage, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(&put_frame(1, "c", "name", "Ariz")).await.unwrap();
        let expected = success(HotRodOperation::Put, 1);
        assert_eq!(read_exactly(&mut client, expected.len()).await, expected);
        assert_eq!(storage.len(), 1);

        client
            .write_all(&key_frame(HotRodOperation::Get, 2, "c", "name"))
            .await
            .unwrap();
        let expected = value(2, "Ariz");
        assert_eq!(read_exactly(&mut client, expected.len()).await, expected);
    }

    #[tokio::test]
    async fn test_pipelined_responses_keep_request_order() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        let mut frames = put_frame(1, "c", "k1", "v1");
        frames.extend_from_slice(&key_frame(HotRodOperation::Get, 2, "c", "k1"));
        frames.extend_from_slice(&key_frame(HotRodOperation::Get, 3, "c", "missing"));
        frames.extend_from_slice(&put_frame(4, "c", "k2", "v2"));
        frames.extend_from_slice(&key_frame(HotRodOperation::Get, 5, "c", "k2"));
        client.write_all(&frames).await.unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&success(HotRodOperation::Put, 1));
        expected.extend_from_slice(&value(2, "v1"));
        expected.extend_from_slice(&not_found(3));
        expected.extend_from_slice(&success(HotRodOperation::Put, 4));
        expected.extend_from_slice(&value(5, "v2"));

        assert_eq!(read_exactly(&mut client, expected.len()).await, expected);
    }

    #[tokio::test]
    async fn test_pipelining_past_pending_limit() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();
        let requests = 3 * MAX_PENDING_RESPONSES as u64;

        let mut frames = put_frame(1, "c", "k", "v");
        for id in 2..=requests {
            frames.extend_from_slice(&key_frame(HotRodOperation::Get, id, "c", "k"));
        }
        client.write_all(&frames).await.unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&success(HotRodOperation::Put, 1));
        for id in 2..=requests {
            expected.extend_from_slice(&value(id, "v"));
        }

        assert_eq!(read_exactly(&mut client, expected.len()).await, expected);
    }

    #[tokio::test]
    async fn test_invalid_magic_gets_error_then_close() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(&[0x42, 0x01, 0x02]).await.unwrap();

        let mut buf = Vec::new();
        timeout(Duration::from_secs(2), client.read_to_end(&mut buf))
            .await
            .unwrap()
            .unwrap();

        let response = decode_response(&buf);
        assert_eq!(response.opcode, 0x50);
        assert_eq!(response.status, OperationStatus::InvalidMagicOrMsgId);
        assert_eq!(response.message_id, 0);
    }

    #[tokio::test]
    async fn test_unknown_version_echoes_message_id() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        let mut frame = BytesMut::new();
        request_header(&mut frame, HotRodOperation::Ping, 99, 21, "", 0);
        client.write_all(&frame).await.unwrap();

        let mut buf = Vec::new();
        timeout(Duration::from_secs(2), client.read_to_end(&mut buf))
            .await
            .unwrap()
            .unwrap();

        let response = decode_response(&buf);
        assert_eq!(response.status, OperationStatus::UnknownVersion);
        assert_eq!(response.message_id, 21);
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let (addr, _, stats) = create_test_server().await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);

        let mut client = TcpStream::connect(addr).await.unwrap();

        // Give the server time to accept the connection
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);

        // Send a request
        client.write_all(&put_frame(1, "c", "k", "v")).await.unwrap();
        let expected = success(HotRodOperation::Put, 1);
        read_exactly(&mut client, expected.len()).await;

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(stats.requests_processed.load(Ordering::Relaxed) >= 1);
        assert!(stats.bytes_read.load(Ordering::Relaxed) > 0);
        assert!(stats.bytes_written.load(Ordering::Relaxed) > 0);

        // Close connection
        drop(client);

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }
}
