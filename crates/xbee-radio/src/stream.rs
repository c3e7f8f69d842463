use std::io::{ErrorKind, Read, Write};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use bytes::{Buf, BytesMut};
use tracing::warn;
use xbee_frame::{Frame, MAX_RF_PAYLOAD};

use crate::radio::Radio;

/// Default bytes per transmitted frame.
pub const DEFAULT_MAX_PAYLOAD: usize = 80;

/// An ordinary byte stream to one peer, carried in radio frames.
///
/// Writes are split into frames of at most [`max_payload`](Self::max_payload)
/// bytes, each acknowledged by the radio before the next is sent. Reads
/// reassemble the peer's frames in arrival order. Frame boundaries are not
/// preserved.
///
/// A write that fails after some chunks went out returns the count sent, and
/// the failure is returned by the next `write` or `flush`. The failed chunk is
/// never resent on the caller's behalf.
///
/// Creating a stream registers it as the peer's listener, replacing any earlier
/// one.
pub struct RadioStream {
    radio: Radio,
    peer: u16,
    inbound: Receiver<Frame>,
    backlog: BytesMut,
    max_payload: usize,
    read_timeout: Option<Duration>,
    /// Failure behind the last partial write, reported by the next call.
    write_error: Option<std::io::Error>,
}

impl RadioStream {
    pub fn new(radio: Radio, peer: u16) -> Self {
        let inbound = radio.listen(peer);
        Self {
            radio,
            peer,
            inbound,
            backlog: BytesMut::new(),
            max_payload: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_error: None,
        }
    }

    /// Set the largest chunk per frame, clamped to `1..=100`.
    pub fn with_max_payload(mut self, max: usize) -> Self {
        self.max_payload = max.clamp(1, MAX_RF_PAYLOAD);
        self
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// The peer's 16-bit address.
    pub fn peer(&self) -> u16 {
        self.peer
    }

    pub fn radio(&self) -> &Radio {
        &self.radio
    }

    /// Bound how long a read waits for the peer. `None` waits forever.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }

    /// Read exactly one byte.
    pub fn read_byte(&mut self) -> std::io::Result<u8> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte)? {
            0 => Err(std::io::Error::from(ErrorKind::UnexpectedEof)),
            _ => Ok(byte[0]),
        }
    }

    // Returns false once the radio has gone away.
    fn fill_backlog(&mut self) -> std::io::Result<bool> {
        while self.backlog.is_empty() {
            let frame = match self.read_timeout {
                Some(timeout) => match self.inbound.recv_timeout(timeout) {
                    Ok(frame) => frame,
                    Err(RecvTimeoutError::Timeout) => {
                        return Err(std::io::Error::new(
                            ErrorKind::TimedOut,
                            format!("no data from peer {:#06x} within {timeout:?}", self.peer),
                        ));
                    }
                    Err(RecvTimeoutError::Disconnected) => return Ok(false),
                },
                None => match self.inbound.recv() {
                    Ok(frame) => frame,
                    Err(_) => return Ok(false),
                },
            };
            self.backlog.extend_from_slice(frame.data());
        }
        Ok(true)
    }
}

impl Read for RadioStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if !self.fill_backlog()? {
            return Ok(0);
        }

        let n = buf.len().min(self.backlog.len());
        buf[..n].copy_from_slice(&self.backlog[..n]);
        self.backlog.advance(n);
        Ok(n)
    }
}

impl Write for RadioStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if let Some(err) = self.write_error.take() {
            return Err(err);
        }

        let mut written = 0usize;
        for chunk in buf.chunks(self.max_payload) {
            match self.radio.send(self.peer, chunk) {
                Ok(()) => written += chunk.len(),
                Err(err) if written > 0 => {
                    warn!(peer = self.peer, written, error = %err, "partial stream write");
                    self.write_error = Some(err.into());
                    return Ok(written);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.write_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for RadioStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RadioStream")
            .field("peer", &self.peer)
            .field("buffered", &self.backlog.len())
            .field("max_payload", &self.max_payload)
            .finish()
    }
}
