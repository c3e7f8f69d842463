/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame does not begin with the start delimiter.
    #[error("invalid start byte {0:#04x} (expected 0x7e)")]
    InvalidStart(u8),

    /// The trailing checksum does not match the frame contents.
    #[error("checksum mismatch (expected {expected:#04x}, got {actual:#04x})")]
    Checksum { expected: u8, actual: u8 },

    /// The length field is zero, so there is no frame type.
    #[error("frame declares zero length")]
    EmptyFrame,

    /// The length field exceeds the configured maximum.
    #[error("frame length too large ({length} bytes, max {max})")]
    FrameTooLarge { length: usize, max: usize },

    /// The payload does not fit in the 16-bit length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The length field disagrees with the number of bytes present.
    #[error("length field declares {declared} bytes but {actual} are present")]
    LengthMismatch { declared: usize, actual: usize },

    /// The link went quiet in the middle of a frame.
    #[error("incomplete frame (link timed out mid-frame)")]
    Incomplete,

    /// An escape marker was the last byte of the input.
    #[error("input ends with a dangling escape byte")]
    TrailingEscape,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link was closed.
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// Whether the stream is still usable after this error.
    ///
    /// Framing errors only cost the frame they occurred in; the reader resumes
    /// scanning for the next start byte. I/O failures and a closed link are
    /// terminal.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FrameError::InvalidStart(_)
                | FrameError::Checksum { .. }
                | FrameError::EmptyFrame
                | FrameError::FrameTooLarge { .. }
                | FrameError::LengthMismatch { .. }
                | FrameError::Incomplete
                | FrameError::TrailingEscape
        )
    }

    /// True for an I/O timeout between frames, i.e. the link was merely idle.
    pub fn is_idle_timeout(&self) -> bool {
        matches!(
            self,
            FrameError::Io(err)
                if matches!(err.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut)
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// Failure outcome reported by the radio in a response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StatusError {
    /// Command response status 1.
    #[error("command failed")]
    CommandFailed,

    /// Command response status 2.
    #[error("invalid command")]
    InvalidCommand,

    /// Command response status 3.
    #[error("invalid command parameter")]
    InvalidParameter,

    /// Transmit status 1: the destination never acknowledged.
    #[error("no acknowledgement from destination")]
    NoAck,

    /// Transmit status 2: clear channel assessment failed.
    #[error("channel access failure")]
    ChannelAccessFailure,

    /// Transmit status 3: the radio dropped the transmission.
    #[error("transmission purged")]
    Purged,

    /// The frame is too short to carry its status byte.
    #[error("status byte missing from frame type {frame_type:#04x}")]
    Missing { frame_type: u8 },

    /// Any other non-zero status byte.
    #[error("non-zero status {status:#04x} in frame type {frame_type:#04x}")]
    Unexpected { frame_type: u8, status: u8 },
}
