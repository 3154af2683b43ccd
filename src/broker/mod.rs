//! The broker core: topic store, subscription registry, connection table and
//! the engine that applies decoded frames to them.

pub mod engine;
pub mod message;
pub mod subscription;
pub mod topic;

pub use engine::Broker;
