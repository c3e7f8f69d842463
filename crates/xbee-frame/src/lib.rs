//! Escaped API frame codec for XBee 802.15.4 radios.
//!
//! Every message exchanged with the radio is framed as:
//! - A start delimiter `0x7E`, never escaped
//! - A 2-byte big-endian length covering type through data
//! - A frame type byte and, for most types, a correlation id
//! - Type-specific fields and an opaque payload
//! - A checksum making the bytes after the length sum to `0xFF`
//!
//! Everything after the start delimiter is escaped so that the delimiter and
//! software flow-control bytes never appear inside a frame.

pub mod codec;
pub mod error;
pub mod escape;
pub mod node;
pub mod reader;
pub mod sequence;
#[cfg(feature = "async")]
pub mod tokio_codec;
pub mod types;
pub mod writer;

pub use codec::{Fields, Frame, FrameConfig, DEFAULT_MAX_FRAME_LENGTH, HEADER_SIZE, MAX_LENGTH};
pub use error::{FrameError, Result, StatusError};
pub use node::Node;
pub use reader::FrameReader;
pub use sequence::Sequence;
#[cfg(feature = "async")]
pub use tokio_codec::ApiCodec;
pub use types::{FrameType, MAX_IDENTIFIER_LEN, MAX_RF_PAYLOAD};
pub use writer::FrameWriter;
