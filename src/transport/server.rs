//! TCP transport
//!
//! One dispatcher task owns the `Broker` and multiplexes three sources:
//! the shutdown signal, the listener (accept-ready) and the connection event
//! channel (a frame or a close from some connection). Each event is handled
//! to completion before the next is taken, so broker state is only ever
//! mutated sequentially.
//!
//! Per connection there are two helper tasks:
//! - a reader that turns the socket into `ConnectionEvent`s
//! - a writer that drains the client's channel into the socket
//!
//! A protocol error on one connection tears down that connection only.

use std::future::Future;
use std::net::SocketAddr;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::broker::Broker;
use crate::client::{Client, ConnectionId};
use crate::config::Settings;
use crate::transport::frame;
use crate::utils::{BrokerError, Result};

#[derive(Debug)]
pub enum ConnectionEvent {
    Frame {
        client_id: ConnectionId,
        body: Bytes,
    },
    Closed {
        client_id: ConnectionId,
        reason: BrokerError,
    },
}

pub struct Server {
    listener: TcpListener,
    settings: Settings,
}

impl Server {
    /// Bind the listener described by `settings.server`.
    pub async fn bind(settings: Settings) -> Result<Self> {
        let listener = TcpListener::bind(settings.server.addr()).await?;
        info!(addr = %listener.local_addr()?, "broker listening");
        Ok(Self { listener, settings })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the dispatcher until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let Server { listener, settings } = self;
        let mut broker = Broker::with_settings(&settings.broker);
        let max_connections = settings.broker.max_connections;
        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<ConnectionEvent>();

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        accept_connection(&mut broker, stream, peer, &events_tx, max_connections);
                    }
                    Err(e) => error!(error = %e, "Failed to accept connection"),
                },
                Some(event) = events_rx.recv() => handle_event(&mut broker, event),
            }
        }

        info!(
            connections = broker.connection_count(),
            "dispatcher stopped"
        );
        Ok(())
    }
}

fn accept_connection(
    broker: &mut Broker,
    stream: TcpStream,
    peer: SocketAddr,
    events: &UnboundedSender<ConnectionEvent>,
    max_connections: usize,
) {
    if max_connections > 0 && broker.connection_count() >= max_connections {
        warn!(peer = %peer, "Connection rejected: limit reached");
        return;
    }
    if let Err(e) = stream.set_nodelay(true) {
        debug!(peer = %peer, error = %e, "could not set TCP_NODELAY");
    }

    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel::<Bytes>();
    let client = Client::new(tx).with_peer(peer);
    let client_id = client.id.clone();

    tokio::spawn(write_loop(write_half, rx, client_id.clone(), events.clone()));
    let reader = tokio::spawn(read_loop(read_half, client_id.clone(), events.clone()));

    broker.register_client(client.with_reader(reader.abort_handle()));
    info!(client_id = %client_id, peer = %peer, "accepted connection");
}

pub(crate) fn handle_event(broker: &mut Broker, event: ConnectionEvent) {
    match event {
        ConnectionEvent::Frame { client_id, body } => {
            if let Err(e) = broker.handle_frame(&client_id, &body) {
                warn!(client_id = %client_id, error = %e, "closing connection");
                broker.cleanup_client(&client_id);
            }
        }
        ConnectionEvent::Closed {
            client_id,
            reason: BrokerError::PeerClosed,
        } => {
            debug!(client_id = %client_id, "peer closed");
            broker.cleanup_client(&client_id);
        }
        ConnectionEvent::Closed { client_id, reason } => {
            warn!(client_id = %client_id, error = %reason, "connection failed");
            broker.cleanup_client(&client_id);
        }
    }
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    client_id: ConnectionId,
    events: UnboundedSender<ConnectionEvent>,
) {
    loop {
        match frame::read_frame(&mut reader).await {
            Ok(body) => {
                let event = ConnectionEvent::Frame {
                    client_id: client_id.clone(),
                    body,
                };
                if events.send(event).is_err() {
                    break;
                }
            }
            Err(reason) => {
                let _ = events.send(ConnectionEvent::Closed { client_id, reason });
                break;
            }
        }
    }
}

/// Drain `frames` into `writer`. A failed write is reported as a close so the
/// dispatcher drops the connection without waiting for the reader.
pub(crate) async fn write_loop<W>(
    mut writer: W,
    mut frames: UnboundedReceiver<Bytes>,
    client_id: ConnectionId,
    events: UnboundedSender<ConnectionEvent>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = frames.recv().await {
        if let Err(e) = writer.write_all(&frame).await {
            warn!(client_id = %client_id, error = %e, "Failed to send frame");
            let _ = events.send(ConnectionEvent::Closed {
                client_id: client_id.clone(),
                reason: BrokerError::Io(e),
            });
            break;
        }
    }
    let _ = writer.shutdown().await;
    debug!(client_id = %client_id, "send loop closed");
}
