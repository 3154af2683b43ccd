//! # pubsub-broker
//!
//! `pubsub_broker` is a single-process publish/subscribe message broker.
//! Clients connect over TCP, pick a serialization format in their first
//! frame, then publish values under named topics, subscribe to topic
//! prefixes and list the known topics.
//!
//! ## Core Modules
//!
//! - `broker`: topic store, subscription registry and the engine that applies frames.
//! - `client`: the broker's record of a connected client.
//! - `codec`: JSON, XML and binary encodings of protocol messages.
//! - `config`: loading server and broker settings.
//! - `transport`: length-prefixed framing and the TCP dispatcher.
//! - `utils`: shared error type and logging setup.

pub mod broker;
pub mod client;
pub mod codec;
pub mod config;
pub mod transport;
pub mod utils;
