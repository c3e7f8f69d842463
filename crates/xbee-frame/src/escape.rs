//! Transparency codec for API mode with escaping.
//!
//! Four byte values have meaning on the link: the frame start delimiter, the
//! escape marker, and the XON/XOFF software flow-control bytes. Anywhere else in
//! a frame they are sent as the escape marker followed by the original byte
//! with bit 5 flipped.
//!
//! The start delimiter at offset 0 is the one exception. It is written raw and
//! matched raw, so a reader takes it before switching into escaped mode.

use std::io::{ErrorKind, Read, Write};

use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Frame start delimiter.
pub const START: u8 = 0x7E;
/// Escape marker.
pub const ESCAPE: u8 = 0x7D;
/// Software flow control: resume.
pub const XON: u8 = 0x11;
/// Software flow control: pause.
pub const XOFF: u8 = 0x13;

const FLIP: u8 = 0x20;

/// Returns true if `byte` must be escaped inside a frame.
#[inline]
pub fn needs_escape(byte: u8) -> bool {
    matches!(byte, START | ESCAPE | XON | XOFF)
}

/// Append the escaped form of `src` to `dst`.
pub fn escape_into(src: &[u8], dst: &mut BytesMut) {
    dst.reserve(src.len());
    for &byte in src {
        if needs_escape(byte) {
            dst.put_u8(ESCAPE);
            dst.put_u8(byte ^ FLIP);
        } else {
            dst.put_u8(byte);
        }
    }
}

/// Escape a byte slice into a new buffer.
pub fn escape(src: &[u8]) -> BytesMut {
    let mut dst = BytesMut::with_capacity(src.len());
    escape_into(src, &mut dst);
    dst
}

/// Reverse [`escape`].
///
/// Fails with [`FrameError::TrailingEscape`] if the input ends with an escape
/// marker whose partner byte never arrived.
pub fn unescape(src: &[u8]) -> Result<BytesMut> {
    let mut state = Unescaper::new();
    let mut dst = BytesMut::with_capacity(src.len());
    for &byte in src {
        if let Some(decoded) = state.push(byte) {
            dst.put_u8(decoded);
        }
    }
    if state.is_pending() {
        return Err(FrameError::TrailingEscape);
    }
    Ok(dst)
}

/// Byte-at-a-time unescaping state.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unescaper {
    pending: bool,
}

impl Unescaper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one wire byte. Returns the decoded byte, or `None` if the byte was an
    /// escape marker and the decoded value depends on the next one.
    #[inline]
    pub fn push(&mut self, byte: u8) -> Option<u8> {
        if self.pending {
            self.pending = false;
            Some(byte ^ FLIP)
        } else if byte == ESCAPE {
            self.pending = true;
            None
        } else {
            Some(byte)
        }
    }

    /// True between an escape marker and its partner byte.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Forget a half-consumed escape sequence.
    pub fn reset(&mut self) {
        self.pending = false;
    }
}

/// Unescapes everything read through it.
///
/// Reads the inner stream one byte at a time, so wrap unbuffered sources in a
/// `BufReader` first.
pub struct EscapedReader<R> {
    inner: R,
    state: Unescaper,
}

impl<R: Read> EscapedReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            state: Unescaper::new(),
        }
    }

    /// Drop any half-read escape sequence, e.g. when resynchronizing on a new frame.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Mutably borrow the underlying stream. Bytes read this way bypass unescaping.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for EscapedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0usize;
        let mut byte = [0u8; 1];

        while filled < buf.len() {
            match self.inner.read(&mut byte) {
                Ok(0) if self.state.is_pending() => {
                    return Err(std::io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "stream ended inside an escape sequence",
                    ));
                }
                Ok(0) => break,
                Ok(_) => {
                    if let Some(decoded) = self.state.push(byte[0]) {
                        buf[filled] = decoded;
                        filled += 1;
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(_) if filled > 0 => break,
                Err(err) => return Err(err),
            }
        }

        Ok(filled)
    }
}

/// Escapes everything written through it.
pub struct EscapedWriter<W> {
    inner: W,
    buf: BytesMut,
}

impl<W: Write> EscapedWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(256),
        }
    }

    /// Write bytes without escaping them. Used for the frame start delimiter.
    pub fn write_raw(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        write_fully(&mut self.inner, bytes)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for EscapedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.clear();
        escape_into(buf, &mut self.buf);
        write_fully(&mut self.inner, &self.buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

fn write_fully<W: Write>(inner: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        match inner.write(&bytes[offset..]) {
            Ok(0) => return Err(std::io::Error::from(ErrorKind::WriteZero)),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(())
}
