//! Response Writer
//!
//! Every request is handed exactly one [`ResponseWriter`]. Writing consumes
//! the writer, so a handler cannot emit a second response for the same
//! request, whether it answers inline or from a task that finishes later.
//!
//! The matching [`ResponseSlot`] is owned by the connection, which queues
//! slots in request order and drains them to the socket one by one.

use bytes::Bytes;
use tokio::sync::oneshot;
use tracing::trace;

/// Receiving half of a request's response.
pub type ResponseSlot = oneshot::Receiver<Bytes>;

/// Hands one finished response buffer to the connection.
#[derive(Debug)]
pub struct ResponseWriter {
    tx: oneshot::Sender<Bytes>,
}

impl ResponseWriter {
    /// Creates a writer and the slot its response will arrive on.
    pub fn channel() -> (Self, ResponseSlot) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Sends the response. Fire-and-forget: if the connection is already
    /// gone the buffer is dropped.
    pub fn write(self, buf: Bytes) {
        let len = buf.len();
        if self.tx.send(buf).is_err() {
            trace!(bytes = len, "Connection closed before response was written");
        }
    }
}
