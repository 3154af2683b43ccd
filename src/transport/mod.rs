//! The `transport` module is responsible for network communication with
//! clients over TCP.
//!
//! It implements the length-prefixed framing used on the wire and the server
//! that accepts connections, reads frames and hands them to the broker.

pub mod frame;
pub mod reply;
pub mod server;

pub use reply::read_replies_until;
pub use server::{ConnectionEvent, Server};
