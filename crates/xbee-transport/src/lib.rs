//! Byte-stream link abstraction for XBee radios.
//!
//! The radio is reached over a serial port, which this crate never drives
//! directly. Instead it defines the minimal capability the upper layers need:
//! a bidirectional byte stream that can be split into an owned read half and
//! an owned write half ([`SplitLink`]). [`LinkStream`] implements it for TCP
//! and Unix-socket serial bridges.
//!
//! This is the lowest layer of the stack. Framing lives in `xbee-frame`.

pub mod error;
pub mod traits;

pub use error::{Result, TransportError};
pub use traits::{LinkStream, SplitLink};
