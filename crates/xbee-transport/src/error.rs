/// Errors that can occur while opening or splitting a radio link.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the link target.
    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        source: std::io::Error,
    },

    /// The link target string could not be understood.
    #[error("invalid link target {0:?} (expected tcp://host:port or unix:/path)")]
    InvalidTarget(String),

    /// An I/O error occurred on the link.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
