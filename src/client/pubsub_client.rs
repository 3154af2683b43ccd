//! Client representation
//!
//! `Client` is the broker's record of one open connection: its identity, the
//! serialization format it negotiated, and the sending side of the channel
//! that feeds its writer task. The connection table is the broker's map of
//! these records.
//!
//! A record starts in `ConnectionState::New`. The first frame on the
//! connection is the handshake and moves it to `FormatBound`.

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::codec::Format;

pub type ConnectionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for the handshake frame.
    New,
    /// Handshake done; every later frame uses this format.
    FormatBound(Format),
}

#[derive(Debug)]
pub struct Client {
    pub id: ConnectionId,
    pub peer: Option<SocketAddr>,
    pub state: ConnectionState,
    /// Framed bytes queued for the writer task.
    pub sender: UnboundedSender<Bytes>,
    reader: Option<AbortHandle>,
}

impl Client {
    /// Create a new client with a sender channel. The `id` is a UUID used
    /// to identify the connection across broker operations.
    pub fn new(sender: UnboundedSender<Bytes>) -> Self {
        Self {
            id: format!("client-{}", Uuid::new_v4()),
            peer: None,
            state: ConnectionState::New,
            sender,
            reader: None,
        }
    }

    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Tie the connection's reader task to this record; dropping the record aborts it.
    pub fn with_reader(mut self, reader: AbortHandle) -> Self {
        self.reader = Some(reader);
        self
    }

    /// Negotiated format, or the JSON default before the handshake.
    pub fn format(&self) -> Format {
        match self.state {
            ConnectionState::New => Format::default(),
            ConnectionState::FormatBound(format) => format,
        }
    }

    pub fn bind_format(&mut self, format: Format) {
        self.state = ConnectionState::FormatBound(format);
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}
