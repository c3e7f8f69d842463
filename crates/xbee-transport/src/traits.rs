use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
#[cfg(unix)]
use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};

/// A link that can be split into an independently owned read half and write half.
///
/// The radio runs its decode loop on a dedicated thread that owns the read half,
/// while callers write frames through the write half. Serial port drivers usually
/// satisfy this with a `try_clone` of the port handle.
pub trait SplitLink {
    /// Read half, moved onto the decode thread.
    type Reader: Read + Send + 'static;
    /// Write half, shared by callers behind the radio's lock.
    type Writer: Write + Send + 'static;

    /// Split the link into its two halves.
    fn split(self) -> Result<(Self::Reader, Self::Writer)>;

    /// Tear the link down through its write half, so that a read blocked on
    /// the read half returns end-of-stream.
    ///
    /// Links with nothing to release keep the default.
    fn shutdown(writer: &Self::Writer) -> Result<()> {
        let _ = writer;
        Ok(())
    }
}

/// A connected byte stream to a radio.
///
/// The radio itself hangs off a serial port; in practice that port is often
/// exported over TCP (ser2net, esp-link) or a Unix socket (socat PTY bridge).
/// This type covers both without pulling in a serial driver.
pub struct LinkStream {
    inner: LinkStreamInner,
}

enum LinkStreamInner {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Read for LinkStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            LinkStreamInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for LinkStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            LinkStreamInner::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            LinkStreamInner::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl LinkStream {
    /// Connect to a link target.
    ///
    /// Accepted forms are `tcp://host:port`, a bare `host:port`, and on Unix
    /// `unix:/path/to/socket` (or `unix:///path/to/socket`).
    pub fn connect(target: &str) -> Result<Self> {
        if let Some(rest) = target.strip_prefix("unix:") {
            #[cfg(unix)]
            {
                let path = rest.strip_prefix("//").unwrap_or(rest);
                return Self::connect_unix(path);
            }
            #[cfg(not(unix))]
            {
                let _ = rest;
                return Err(TransportError::InvalidTarget(target.to_string()));
            }
        }

        let addr = target.strip_prefix("tcp://").unwrap_or(target);
        if addr.is_empty() || !addr.contains(':') {
            return Err(TransportError::InvalidTarget(target.to_string()));
        }
        Self::connect_tcp(addr)
    }

    /// Connect to a TCP serial bridge.
    pub fn connect_tcp(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).map_err(|source| TransportError::Connect {
            target: addr.to_string(),
            source,
        })?;
        // Frames are tiny; don't let Nagle hold them back.
        stream.set_nodelay(true).ok();
        debug!(addr, "connected to tcp link");
        Ok(Self::from(stream))
    }

    /// Connect to a Unix socket bridge.
    #[cfg(unix)]
    pub fn connect_unix(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|source| TransportError::Connect {
            target: path.display().to_string(),
            source,
        })?;
        debug!(?path, "connected to unix socket link");
        Ok(Self::from(stream))
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            LinkStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            LinkStreamInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            LinkStreamInner::Tcp(stream) => Ok(Self::from(stream.try_clone()?)),
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => Ok(Self::from(stream.try_clone()?)),
        }
    }

    /// Shut down both directions of the connection, including every clone.
    pub fn shutdown(&self) -> Result<()> {
        match &self.inner {
            LinkStreamInner::Tcp(stream) => shutdown_socket(stream.shutdown(Shutdown::Both)),
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => shutdown_socket(stream.shutdown(Shutdown::Both)),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            LinkStreamInner::Tcp(_) => "tcp",
            #[cfg(unix)]
            LinkStreamInner::Unix(_) => "unix-socket",
        }
    }
}

// A peer that already hung up leaves nothing to shut down.
fn shutdown_socket(result: std::io::Result<()>) -> Result<()> {
    match result {
        Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
        other => other.map_err(Into::into),
    }
}

impl From<TcpStream> for LinkStream {
    fn from(stream: TcpStream) -> Self {
        Self {
            inner: LinkStreamInner::Tcp(stream),
        }
    }
}

#[cfg(unix)]
impl From<UnixStream> for LinkStream {
    fn from(stream: UnixStream) -> Self {
        Self {
            inner: LinkStreamInner::Unix(stream),
        }
    }
}

impl SplitLink for LinkStream {
    type Reader = LinkStream;
    type Writer = LinkStream;

    fn split(self) -> Result<(Self::Reader, Self::Writer)> {
        let reader = self.try_clone()?;
        Ok((reader, self))
    }

    fn shutdown(writer: &Self::Writer) -> Result<()> {
        writer.shutdown()
    }
}

impl SplitLink for TcpStream {
    type Reader = TcpStream;
    type Writer = TcpStream;

    fn split(self) -> Result<(Self::Reader, Self::Writer)> {
        let reader = self.try_clone()?;
        Ok((reader, self))
    }

    fn shutdown(writer: &Self::Writer) -> Result<()> {
        shutdown_socket(writer.shutdown(Shutdown::Both))
    }
}

#[cfg(unix)]
impl SplitLink for UnixStream {
    type Reader = UnixStream;
    type Writer = UnixStream;

    fn split(self) -> Result<(Self::Reader, Self::Writer)> {
        let reader = self.try_clone()?;
        Ok((reader, self))
    }

    fn shutdown(writer: &Self::Writer) -> Result<()> {
        shutdown_socket(writer.shutdown(Shutdown::Both))
    }
}

impl std::fmt::Debug for LinkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkStream")
            .field("type", &self.transport_name())
            .finish()
    }
}
