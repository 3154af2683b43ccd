//! The `utils` module holds the pieces shared by every other module:
//! the crate-wide error type and logging setup.

pub mod error;
pub mod logging;

pub use error::{BrokerError, Result};

#[cfg(test)]
mod tests;
