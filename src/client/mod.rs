//! The `client` module defines the broker's record of a connected client.
//!
//! It provides the `Client` struct, which encapsulates the state of a single
//! connection: its unique identifier, its handshake state and the channel
//! for sending frames to it.

pub mod pubsub_client;
pub use pubsub_client::{Client, ConnectionId, ConnectionState};
