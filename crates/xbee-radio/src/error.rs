use std::io::ErrorKind;
use std::time::Duration;

use xbee_frame::StatusError;

/// Errors that can occur in radio operations.
#[derive(Debug, thiserror::Error)]
pub enum RadioError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] xbee_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] xbee_frame::FrameError),

    /// The radio answered with a failure status.
    #[error("radio reported failure: {0}")]
    Status(#[from] StatusError),

    /// No response arrived before the deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The decode loop has stopped; the link is gone.
    #[error("radio disconnected: {0}")]
    Disconnected(String),

    /// A newer request reused this request's correlation id.
    #[error("request superseded by a newer request with id {0}")]
    Superseded(u8),

    /// The node identifier cannot be sent to the radio.
    #[error("invalid node identifier: {0}")]
    InvalidIdentifier(String),

    /// The payload exceeds what one transmit request can carry.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The radio answered with something that cannot be interpreted.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The decode thread could not be started.
    #[error("failed to spawn decode thread: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RadioError>;

impl From<RadioError> for std::io::Error {
    fn from(err: RadioError) -> Self {
        let kind = match &err {
            RadioError::Timeout(_) => ErrorKind::TimedOut,
            RadioError::Disconnected(_) => ErrorKind::BrokenPipe,
            RadioError::PayloadTooLarge { .. } | RadioError::InvalidIdentifier(_) => {
                ErrorKind::InvalidInput
            }
            RadioError::Frame(xbee_frame::FrameError::ConnectionClosed) => ErrorKind::BrokenPipe,
            RadioError::Frame(xbee_frame::FrameError::Io(io)) => io.kind(),
            RadioError::Transport(xbee_transport::TransportError::Io(io)) => io.kind(),
            _ => ErrorKind::Other,
        };
        std::io::Error::new(kind, err)
    }
}
