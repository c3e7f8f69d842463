//! Client protocol stack for XBee 802.15.4 radios in escaped API mode.
//!
//! # Crate Structure
//!
//! - [`transport`] — Byte-stream link abstraction (TCP and Unix-socket serial bridges)
//! - [`frame`] — Escaping, API frame codec, node decoding
//! - [`radio`] — Request correlation, peer listeners, byte streams
//!
//! ```no_run
//! use std::io::Write;
//!
//! use xbee::transport::LinkStream;
//! use xbee::Radio;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let radio = Radio::open(LinkStream::connect("tcp://127.0.0.1:2000")?)?;
//! radio.set_address(0x3344)?;
//! for node in radio.discover()? {
//!     println!("{:#06x} {}", node.address, node.identifier);
//! }
//! radio.stream(0x1122).write_all(b"hello")?;
//! # Ok(())
//! # }
//! ```

/// Re-export transport types.
pub mod transport {
    pub use xbee_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use xbee_frame::*;
}

/// Re-export radio types.
pub mod radio {
    pub use xbee_radio::*;
}

/// Command-line helpers shared by the demos (requires `cli` feature).
#[cfg(feature = "cli")]
pub mod cli;

pub use xbee_frame::{Frame, FrameError, Node, StatusError};
pub use xbee_radio::{Radio, RadioConfig, RadioError, RadioStream};
pub use xbee_transport::{LinkStream, SplitLink, TransportError};
