//! `tokio_util::codec` implementation of the escaped API frame format.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{trace, warn};

use crate::codec::{Frame, FrameConfig, HEADER_SIZE};
use crate::error::FrameError;
use crate::escape::{Unescaper, START};

/// Decodes and encodes [`Frame`]s on an async byte stream.
///
/// Noise, truncated frames and checksum failures are logged and skipped so a
/// `FramedRead` keeps yielding frames after line corruption.
#[derive(Debug, Clone, Default)]
pub struct ApiCodec {
    config: FrameConfig,
}

impl ApiCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FrameConfig) -> Self {
        Self { config }
    }
}

impl Decoder for ApiCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        'frame: loop {
            let Some(start) = src.iter().position(|b| *b == START) else {
                if !src.is_empty() {
                    trace!(skipped = src.len(), "discarded bytes before start delimiter");
                    src.clear();
                }
                return Ok(None);
            };
            if start > 0 {
                trace!(skipped = start, "discarded bytes before start delimiter");
                src.advance(start);
            }

            let mut state = Unescaper::new();
            let mut raw = BytesMut::with_capacity(HEADER_SIZE + 16);
            raw.put_u8(START);
            let mut needed = None;
            let mut consumed = 1;

            while consumed < src.len() {
                let byte = src[consumed];
                if byte == START {
                    // A raw start byte can only begin a frame.
                    warn!(
                        received = raw.len(),
                        "frame truncated by start delimiter, resynchronizing"
                    );
                    src.advance(consumed);
                    continue 'frame;
                }
                consumed += 1;

                if let Some(decoded) = state.push(byte) {
                    raw.put_u8(decoded);
                }

                if needed.is_none() && raw.len() == HEADER_SIZE {
                    let length = u16::from_be_bytes([raw[1], raw[2]]) as usize;
                    if length == 0 || length > self.config.max_frame_length {
                        warn!(
                            length,
                            max = self.config.max_frame_length,
                            "discarding frame with invalid length"
                        );
                        src.advance(consumed);
                        continue 'frame;
                    }
                    needed = Some(HEADER_SIZE + length + 1);
                }

                if needed == Some(raw.len()) {
                    src.advance(consumed);
                    match Frame::from_bytes(raw.freeze()) {
                        Ok(frame) => return Ok(Some(frame)),
                        Err(err) if err.is_recoverable() => {
                            warn!(error = %err, "discarding invalid frame");
                            continue 'frame;
                        }
                        Err(err) => return Err(err),
                    }
                }
            }

            // Need more data.
            return Ok(None);
        }
    }
}

impl Encoder<Frame> for ApiCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        item.encode_to(dst);
        Ok(())
    }
}

impl Encoder<&Frame> for ApiCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        item.encode_to(dst);
        Ok(())
    }
}
