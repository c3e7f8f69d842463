use std::io::{ErrorKind, Write};

use tracing::trace;

use crate::codec::Frame;
use crate::error::{FrameError, Result};
use crate::escape::EscapedWriter;

/// Writes complete frames to any `Write` stream.
///
/// The start delimiter goes out raw; everything after it is escaped.
pub struct FrameWriter<T> {
    inner: EscapedWriter<T>,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner: EscapedWriter::new(inner),
        }
    }

    /// Write a complete frame and flush (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let bytes = frame.as_bytes();
        self.inner.write_raw(&bytes[..1]).map_err(write_error)?;
        self.inner.write_all(&bytes[1..]).map_err(write_error)?;
        trace!(bytes = ?bytes, "frame sent");
        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        self.inner.get_ref()
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

fn write_error(err: std::io::Error) -> FrameError {
    match err.kind() {
        ErrorKind::WriteZero | ErrorKind::BrokenPipe => FrameError::ConnectionClosed,
        _ => FrameError::Io(err),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::codec::Fields;
    use crate::escape::unescape;
    use crate::reader::FrameReader;

    fn tx_frame() -> Frame {
        Frame::build_with_id(1, &Fields::tx16(0x0002, 0), b"retry").unwrap()
    }

    #[test]
    fn write_single_frame() {
        let frame = Frame::build_with_id(1, &Fields::set_address(0x0002), &[]).unwrap();
        let mut writer = FrameWriter::new(Vec::new());
        writer.write_frame(&frame).unwrap();

        let wire = writer.into_inner();
        assert_eq!(wire, frame.as_bytes());
    }

    #[test]
    fn escapes_after_start_byte() {
        // Id 0x11 and payload 0x7E both need escaping.
        let frame = Frame::build_with_id(0x11, &Fields::tx16(0x0001, 0), &[0x7E]).unwrap();
        let mut writer = FrameWriter::new(Vec::new());
        writer.write_frame(&frame).unwrap();

        let wire = writer.into_inner();
        assert_eq!(wire[0], 0x7E);
        assert_eq!(&wire[1..6], &[0x00, 0x06, 0x01, 0x7D, 0x31]);
        assert!(!wire[1..].contains(&0x7E));
        assert_eq!(unescape(&wire[1..]).unwrap().as_ref(), &frame.as_bytes()[1..]);
    }

    #[test]
    fn flush_propagates() {
        let flushed = Arc::new(AtomicBool::new(false));
        let mut writer = FrameWriter::new(FlushTrackingWriter {
            flushed: Arc::clone(&flushed),
            data: Vec::new(),
        });

        writer.write_frame(&tx_frame()).unwrap();
        assert!(flushed.load(Ordering::SeqCst));
        assert!(!writer.get_ref().data.is_empty());
    }

    #[test]
    fn handles_interrupted_write_and_flush() {
        let mut writer = FrameWriter::new(FlakyWriter {
            kind: ErrorKind::Interrupted,
            write_failed: false,
            flush_failed: false,
            data: Vec::new(),
        });
        writer.write_frame(&tx_frame()).unwrap();

        assert_eq!(writer.into_inner().data, tx_frame().as_bytes());
    }

    #[test]
    fn handles_would_block_write_and_flush() {
        let mut writer = FrameWriter::new(FlakyWriter {
            kind: ErrorKind::WouldBlock,
            write_failed: false,
            flush_failed: false,
            data: Vec::new(),
        });
        writer.write_frame(&tx_frame()).unwrap();

        assert_eq!(writer.get_mut().data, tx_frame().as_bytes());
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.write_frame(&tx_frame()).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn written_bytes_decode() {
        let frame = Frame::build_with_id(0x7D, &Fields::tx16(0x1313, 0), b"\x11z").unwrap();
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.write_frame(&frame).unwrap();

        let wire = writer.into_inner().into_inner();
        let mut reader = FrameReader::new(Cursor::new(wire));
        assert_eq!(reader.read_frame().unwrap(), frame);
    }

    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FlakyWriter {
        kind: ErrorKind,
        write_failed: bool,
        flush_failed: bool,
        data: Vec<u8>,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.write_failed {
                self.write_failed = true;
                return Err(std::io::Error::from(self.kind));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_failed {
                self.flush_failed = true;
                return Err(std::io::Error::from(self.kind));
            }
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
