use std::io::{BufReader, ErrorKind, Read};

use bytes::{BufMut, BytesMut};
use tracing::trace;

use crate::codec::{Frame, FrameConfig, HEADER_SIZE};
use crate::error::{FrameError, Result};
use crate::escape::{EscapedReader, START};

/// Reads complete frames from any `Read` stream.
///
/// Bytes before a start delimiter are discarded, so the reader resynchronizes
/// on its own after line noise or a corrupted frame.
pub struct FrameReader<T> {
    inner: EscapedReader<BufReader<T>>,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner: EscapedReader::new(BufReader::new(inner)),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached. A read
    /// timeout before any start byte surfaces as `FrameError::Io`; one inside a
    /// frame as `FrameError::Incomplete`.
    pub fn read_frame(&mut self) -> Result<Frame> {
        self.seek_start()?;
        self.inner.reset();

        let mut header = [0u8; 2];
        self.read_exact_in_frame(&mut header)?;
        let length = u16::from_be_bytes(header) as usize;
        if length == 0 {
            return Err(FrameError::EmptyFrame);
        }
        if length > self.config.max_frame_length {
            return Err(FrameError::FrameTooLarge {
                length,
                max: self.config.max_frame_length,
            });
        }

        // Body plus trailing checksum.
        let total = HEADER_SIZE + length + 1;
        let mut raw = BytesMut::with_capacity(total);
        raw.put_u8(START);
        raw.put_slice(&header);
        raw.resize(total, 0);
        self.read_exact_in_frame(&mut raw[HEADER_SIZE..])?;

        trace!(bytes = ?raw.as_ref(), "frame received");
        Frame::from_bytes(raw.freeze())
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        self.inner.get_ref().get_ref()
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut().get_mut()
    }

    /// Update the maximum declared length for subsequent frames.
    pub fn set_max_frame_length(&mut self, max: usize) {
        self.config.max_frame_length = max;
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    // The start byte is never escaped, so it is matched on the raw stream.
    fn seek_start(&mut self) -> Result<()> {
        let mut byte = [0u8; 1];
        let mut skipped = 0usize;
        loop {
            match self.inner.get_mut().read(&mut byte) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(_) if byte[0] == START => {
                    if skipped > 0 {
                        trace!(skipped, "discarded bytes before start delimiter");
                    }
                    return Ok(());
                }
                Ok(_) => skipped += 1,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    fn read_exact_in_frame(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf).map_err(|err| match err.kind() {
            ErrorKind::UnexpectedEof => FrameError::ConnectionClosed,
            ErrorKind::WouldBlock | ErrorKind::TimedOut => FrameError::Incomplete,
            _ => FrameError::Io(err),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::Fields;
    use crate::types::CMD_DISCOVER;
    use crate::writer::FrameWriter;

    fn wire(frames: &[Frame]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for frame in frames {
            frame.encode_to(&mut buf);
        }
        buf.to_vec()
    }

    fn status(id: u8, status: u8) -> Frame {
        Frame::build_with_id(id, &Fields::tx_status(status), &[]).unwrap()
    }

    #[test]
    fn read_single_frame() {
        let frame = Frame::received16(0x0002, 0x28, 0, b"hello").unwrap();
        let mut reader = FrameReader::new(Cursor::new(wire(&[frame.clone()])));

        assert_eq!(reader.read_frame().unwrap(), frame);
    }

    #[test]
    fn read_multiple_frames() {
        let frames = vec![
            status(1, 0),
            Frame::build_with_id(2, &Fields::at_response(CMD_DISCOVER, 0), &[]).unwrap(),
            Frame::modem(0x02).unwrap(),
        ];
        let mut reader = FrameReader::new(Cursor::new(wire(&frames)));

        for expected in &frames {
            assert_eq!(&reader.read_frame().unwrap(), expected);
        }
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }

    #[test]
    fn reserved_bytes_in_body_are_unescaped() {
        let frame = Frame::received16(0x7D11, 0x13, 0x7E, &[0x7E, 0x7D, 0x11, 0x13]).unwrap();
        let bytes = wire(&[frame.clone()]);
        assert!(bytes.len() > frame.wire_size());

        let mut reader = FrameReader::new(Cursor::new(bytes));
        let decoded = reader.read_frame().unwrap();
        assert_eq!(decoded.source16(), Some(0x7D11));
        assert_eq!(decoded.data(), &[0x7E, 0x7D, 0x11, 0x13]);
    }

    #[test]
    fn skips_noise_before_start() {
        let mut bytes = vec![0x00, 0xFF, 0x42];
        bytes.extend(wire(&[status(9, 0)]));

        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert_eq!(reader.read_frame().unwrap().id(), Some(9));
    }

    #[test]
    fn bad_checksum_then_recovers() {
        let mut bad = wire(&[status(1, 0)]);
        let last = bad.len() - 1;
        bad[last] ^= 0x01;
        bad.extend(wire(&[status(2, 0)]));

        let mut reader = FrameReader::new(Cursor::new(bad));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Checksum { .. }));
        assert!(err.is_recoverable());
        assert_eq!(reader.read_frame().unwrap().id(), Some(2));
    }

    #[test]
    fn zero_length_rejected() {
        let mut reader = FrameReader::new(Cursor::new(vec![0x7E, 0x00, 0x00, 0xFF]));
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::EmptyFrame
        ));
    }

    #[test]
    fn oversized_frame_then_resync() {
        let mut bytes = vec![0x7E, 0x04, 0x00, 0x01, 0x02];
        bytes.extend(wire(&[status(3, 0)]));

        let cfg = FrameConfig::default().with_max_frame_length(64);
        let mut reader = FrameReader::with_config(Cursor::new(bytes), cfg);
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(
            err,
            FrameError::FrameTooLarge {
                length: 0x0400,
                max: 64
            }
        ));
        assert_eq!(reader.read_frame().unwrap().id(), Some(3));
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let bytes = wire(&[Frame::received16(1, 0, 0, b"only-part").unwrap()]);
        let mut reader = FrameReader::new(Cursor::new(bytes[..8].to_vec()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_escape() {
        let mut reader =
            FrameReader::new(Cursor::new(vec![0x7E, 0x00, 0x03, 0x89, 0x7D]));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn partial_read_handling() {
        let frame = Frame::received16(4, 0, 0, b"slow").unwrap();
        let mut reader = FrameReader::new(ByteByByteReader {
            bytes: wire(&[frame.clone()]),
            pos: 0,
        });

        assert_eq!(reader.read_frame().unwrap(), frame);
    }

    #[test]
    fn interrupted_read_retries() {
        let mut reader = FrameReader::new(ErrorThenData {
            kind: Some(ErrorKind::Interrupted),
            bytes: wire(&[status(8, 0)]),
            pos: 0,
        });
        assert_eq!(reader.read_frame().unwrap().id(), Some(8));
    }

    #[test]
    fn idle_would_block_propagates_io_error() {
        let mut reader = FrameReader::new(ErrorThenData {
            kind: Some(ErrorKind::WouldBlock),
            bytes: wire(&[status(7, 0)]),
            pos: 0,
        });
        let err = reader.read_frame().unwrap_err();
        assert!(err.is_idle_timeout());
        assert_eq!(reader.read_frame().unwrap().id(), Some(7));
    }

    #[test]
    #[cfg(unix)]
    fn timeout_mid_frame_is_incomplete() {
        let (mut left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        right
            .set_read_timeout(Some(std::time::Duration::from_millis(20)))
            .unwrap();
        let bytes = wire(&[status(5, 0)]);
        std::io::Write::write_all(&mut left, &bytes[..4]).unwrap();

        let mut reader = FrameReader::new(right);
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Incomplete));
    }

    #[test]
    #[cfg(unix)]
    fn concurrent_reader_writer_threads() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        let reader_thread = std::thread::spawn(move || {
            for i in 0..64u16 {
                let frame = reader.read_frame().unwrap();
                assert_eq!(frame.source16(), Some(i));
                assert_eq!(frame.data(), format!("msg-{i}").as_bytes());
            }
        });

        for i in 0..64u16 {
            let payload = format!("msg-{i}");
            let frame = Frame::received16(i, 0x20, 0, payload.as_bytes()).unwrap();
            writer.write_frame(&frame).unwrap();
        }

        reader_thread.join().unwrap();
    }

    #[test]
    fn accessors() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        reader.set_max_frame_length(100);
        assert_eq!(reader.config().max_frame_length, 100);
        let _ = reader.get_ref();
        let _ = reader.get_mut();
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct ErrorThenData {
        kind: Option<ErrorKind>,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ErrorThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if let Some(kind) = self.kind.take() {
                return Err(std::io::Error::from(kind));
            }
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            let n = (self.bytes.len() - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }
}
