//! Request correlation, peer fan-out and byte streams over an XBee radio.
//!
//! This is the "just works" layer. A [`Radio`] owns the link, stamps every
//! command with a correlation id and blocks the caller until the matching
//! response arrives. Data from peers is routed by source address to
//! listeners, and [`RadioStream`] turns one peer into a `Read + Write` stream.

pub mod config;
pub mod error;
mod pending;
pub mod radio;
#[cfg(all(test, unix))]
mod sim;
pub mod stream;

pub use config::RadioConfig;
pub use error::{RadioError, Result};
pub use radio::Radio;
pub use stream::{RadioStream, DEFAULT_MAX_PAYLOAD};
