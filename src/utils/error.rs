//! The `error` module defines the error type shared by every layer of the broker.
//!
//! Codec, framing, handshake and dispatch failures all surface as a
//! `BrokerError`. The dispatcher treats any of them as fatal for the
//! offending connection only; the broker itself keeps running.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    /// The frame body does not parse under the connection's format.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// The decoded method is not one the broker accepts as a request.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// The handshake named a serialization format the broker does not speak.
    #[error("unknown serialization format: {0}")]
    UnknownFormat(String),

    /// The peer shut down its write side before sending a header.
    #[error("peer closed the connection")]
    PeerClosed,

    #[error("partial frame: expected {expected} bytes, received {received}")]
    PartialFrame { expected: usize, received: usize },

    #[error("frame body of {0} bytes exceeds the {max} byte limit", max = u16::MAX)]
    FrameTooLarge(usize),

    /// The value has no rendering in the target format.
    #[error("value cannot be represented in the {0} format")]
    Unrepresentable(&'static str),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BrokerError>;
