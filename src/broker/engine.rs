//! Broker engine
//!
//! This module contains the in-memory broker responsible for:
//! - the connection table and each connection's handshake state
//! - the topic store and the subscription registry
//! - interpreting frames and producing replies and fan-out frames
//!
//! Concurrency and usage notes:
//! - The API here is synchronous and expects a single owner. The transport
//!   runs one dispatcher task that owns the `Broker` outright, so every frame
//!   is fully applied before the next one is looked at and no lock is needed.
//! - Outbound frames are pushed into the target client's channel; the
//!   per-connection writer task does the socket I/O.

use std::collections::HashMap;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::broker::message::{Message, Method, Value};
use crate::broker::subscription::{SubscriptionKey, SubscriptionRegistry};
use crate::broker::topic::TopicStore;
use crate::client::{Client, ConnectionId, ConnectionState};
use crate::codec::{self, Format};
use crate::config::BrokerSettings;
use crate::transport::frame;
use crate::utils::{BrokerError, Result};

#[derive(Debug, Default)]
pub struct Broker {
    pub topics: TopicStore,
    pub subscriptions: SubscriptionRegistry,
    pub clients: HashMap<ConnectionId, Client>,
    deduplicate_fanout: bool,
}

impl Broker {
    pub fn new() -> Self {
        Self::with_settings(&BrokerSettings::default())
    }

    pub fn with_settings(settings: &BrokerSettings) -> Self {
        Self {
            topics: TopicStore::new(settings.max_history_per_topic),
            subscriptions: SubscriptionRegistry::new(),
            clients: HashMap::new(),
            deduplicate_fanout: settings.deduplicate_fanout,
        }
    }

    pub fn register_client(&mut self, client: Client) {
        debug!(client_id = %client.id, peer = ?client.peer, "client registered");
        self.clients.insert(client.id.clone(), client);
    }

    pub fn connection_count(&self) -> usize {
        self.clients.len()
    }

    /// Negotiated format of a connection; JSON until its handshake arrives.
    pub fn format_of(&self, client_id: &ConnectionId) -> Format {
        self.clients
            .get(client_id)
            .map(Client::format)
            .unwrap_or_default()
    }

    /// Drops the connection record and every subscription it holds.
    ///
    /// Dropping the record closes the client's channel, which ends its writer
    /// task, and aborts its reader task.
    pub fn cleanup_client(&mut self, client_id: &ConnectionId) {
        self.subscriptions.remove_connection(client_id);
        if self.clients.remove(client_id).is_some() {
            info!(client_id = %client_id, "cleaned up client");
        }
    }

    /// Apply one frame body received from `client_id`.
    ///
    /// The first frame of a connection is its handshake. Any error leaves the
    /// broker state untouched for other connections; the caller is expected
    /// to tear down the offending connection.
    pub fn handle_frame(&mut self, client_id: &ConnectionId, body: &[u8]) -> Result<()> {
        let Some(client) = self.clients.get_mut(client_id) else {
            debug!(client_id = %client_id, "frame from unknown connection ignored");
            return Ok(());
        };

        let state = client.state;
        match state {
            ConnectionState::New => {
                let envelope = codec::decode(body, Format::default())?;
                let requested = envelope
                    .value
                    .as_ref()
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        BrokerError::UnknownFormat(format!("{:?}", envelope.value))
                    })?;
                let format: Format = requested.parse()?;
                client.bind_format(format);
                info!(client_id = %client_id, %format, "handshake complete");
                Ok(())
            }
            ConnectionState::FormatBound(format) => {
                let message = codec::decode(body, format)?.into_message()?;
                self.dispatch(client_id, format, message)
            }
        }
    }

    /// Run one request method on behalf of `client_id`.
    pub fn dispatch(
        &mut self,
        client_id: &ConnectionId,
        format: Format,
        message: Message,
    ) -> Result<()> {
        let Message {
            method,
            topic,
            value,
        } = message;

        match method {
            Method::Publish => {
                let topic = require_topic(method, topic)?;
                self.publish(&topic, value.unwrap_or(Value::Null));
                debug!(client_id = %client_id, topic = %topic, "published");
            }
            Method::Subscribe => {
                let topic = require_topic(method, topic)?;
                self.subscriptions.subscribe(&topic, client_id, format);
                debug!(client_id = %client_id, topic = %topic, "subscribed");
                if let Some(current) = self.topics.resolve(&topic) {
                    let reply = codec::encode(Method::SubscribeRep, Some(&topic), current, format)?;
                    self.send(client_id, reply)?;
                }
            }
            Method::Cancel => {
                let topic = require_topic(method, topic)?;
                self.subscriptions.unsubscribe(&topic, client_id);
                debug!(client_id = %client_id, topic = %topic, "unsubscribed");
            }
            Method::ListTopics => {
                let names = self
                    .topics
                    .list_topics()
                    .into_iter()
                    .map(Value::Text)
                    .collect();
                let reply = codec::encode(Method::ListTopicsRep, None, &Value::List(names), format)?;
                self.send(client_id, reply)?;
            }
            Method::PublishRep | Method::SubscribeRep | Method::ListTopicsRep => {
                return Err(BrokerError::UnknownMethod(method.to_string()));
            }
        }
        Ok(())
    }

    /// Store `value` under `topic` and fan it out to every matching subscriber.
    ///
    /// A subscriber holding several matching patterns gets one frame per
    /// pattern unless deduplication is enabled.
    pub fn publish(&mut self, topic: &str, value: Value) {
        self.topics.put(topic, value.clone());

        let mut targets = self.subscriptions.subscribers_for(topic);
        if self.deduplicate_fanout {
            let mut seen = Vec::with_capacity(targets.len());
            targets.retain(|key| {
                if seen.contains(key) {
                    false
                } else {
                    seen.push(key.clone());
                    true
                }
            });
        }

        let mut encoded: HashMap<Format, Bytes> = HashMap::new();
        for SubscriptionKey { connection, format } in targets {
            let frame = match encoded.get(&format) {
                Some(frame) => frame.clone(),
                None => {
                    match codec::encode(Method::PublishRep, Some(topic), &value, format)
                        .and_then(|body| frame::encode_frame(&body))
                    {
                        Ok(frame) => {
                            encoded.insert(format, frame.clone());
                            frame
                        }
                        Err(e) => {
                            warn!(client_id = %connection, %format, topic, error = %e, "cannot encode fan-out");
                            continue;
                        }
                    }
                }
            };
            self.deliver(&connection, frame);
        }
    }

    fn send(&self, client_id: &ConnectionId, body: Vec<u8>) -> Result<()> {
        let frame = frame::encode_frame(&body)?;
        self.deliver(client_id, frame);
        Ok(())
    }

    fn deliver(&self, client_id: &ConnectionId, frame: Bytes) {
        match self.clients.get(client_id) {
            Some(client) => {
                if let Err(e) = client.sender.send(frame) {
                    warn!(client_id = %client_id, error = %e, "failed to queue frame");
                }
            }
            None => warn!(client_id = %client_id, "no client registered"),
        }
    }
}

fn require_topic(method: Method, topic: Option<String>) -> Result<String> {
    topic.ok_or_else(|| BrokerError::MalformedMessage(format!("{method} requires a topic")))
}
