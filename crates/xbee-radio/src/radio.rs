use std::collections::HashMap;
use std::io::{Read, Write};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};
use xbee_frame::types::{modem_status_name, type_name, CMD_ADDRESS, CMD_IDENTIFIER};
use xbee_frame::{
    Fields, Frame, FrameError, FrameReader, FrameType, FrameWriter, Node, Sequence,
    MAX_IDENTIFIER_LEN, MAX_RF_PAYLOAD,
};
use xbee_transport::SplitLink;

use crate::config::RadioConfig;
use crate::error::{RadioError, Result};
use crate::pending::{Completion, PendingRequest, Progress, Reply};
use crate::stream::RadioStream;

/// A handle to one radio.
///
/// Owns the write half of the link and a background thread that decodes every
/// inbound frame. Commands and transmissions block the calling thread until the
/// radio answers or the request deadline passes. Inbound data from a peer is
/// delivered to whoever last called [`Radio::listen`] for that peer's address.
///
/// Cloning is cheap; all clones share the same link and tables.
#[derive(Clone)]
pub struct Radio {
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<State>,
    config: RadioConfig,
    next_token: AtomicU64,
}

struct State {
    writer: FrameWriter<Box<dyn Outbound>>,
    sequence: Sequence,
    pending: HashMap<u8, PendingRequest>,
    subscriptions: HashMap<u16, Subscription>,
    /// Set once the decode loop has stopped.
    closed: Option<String>,
}

struct Subscription {
    token: u64,
    tx: SyncSender<Frame>,
}

/// Write half of the link, plus the means to release the whole link.
trait Outbound: Write + Send {
    fn release(&mut self) -> xbee_transport::Result<()>;
}

/// A bare writer handed to [`Radio::new`]. Releasing it is left to its owner.
struct Detached<W>(W);

impl<W: Write> Write for Detached<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.flush()
    }
}

impl<W: Write + Send> Outbound for Detached<W> {
    fn release(&mut self) -> xbee_transport::Result<()> {
        Ok(())
    }
}

/// The write half of a [`SplitLink`], released through the link's own hook.
struct Linked<L: SplitLink> {
    writer: L::Writer,
    _link: PhantomData<fn() -> L>,
}

impl<L: SplitLink> Write for Linked<L> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl<L: SplitLink> Outbound for Linked<L> {
    fn release(&mut self) -> xbee_transport::Result<()> {
        L::shutdown(&self.writer)
    }
}

impl Radio {
    /// Start a radio over separate read and write halves, e.g. a serial port
    /// and its `try_clone`.
    ///
    /// The radio cannot close halves it did not split itself: after the last
    /// handle is dropped, the decode thread exits on the next inbound byte or
    /// when the caller closes the port.
    pub fn new<R, W>(reader: R, writer: W) -> Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        Self::with_config(reader, writer, RadioConfig::default())
    }

    /// Start a radio with explicit configuration.
    pub fn with_config<R, W>(reader: R, writer: W, config: RadioConfig) -> Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        Self::start(reader, Box::new(Detached(writer)), config)
    }

    /// Start a radio over a link that splits into read and write halves.
    ///
    /// The link is shut down when the last handle is dropped or on
    /// [`Radio::shutdown`].
    pub fn open<L: SplitLink + 'static>(link: L) -> Result<Self> {
        Self::open_with_config(link, RadioConfig::default())
    }

    /// Start a radio over a splittable link with explicit configuration.
    pub fn open_with_config<L: SplitLink + 'static>(link: L, config: RadioConfig) -> Result<Self> {
        let (reader, writer) = link.split()?;
        let writer = Linked::<L> {
            writer,
            _link: PhantomData,
        };
        Self::start(reader, Box::new(writer), config)
    }

    fn start<R>(reader: R, writer: Box<dyn Outbound>, config: RadioConfig) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let reader = FrameReader::with_config(reader, config.frame_config());
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                writer: FrameWriter::new(writer),
                sequence: Sequence::new(),
                pending: HashMap::new(),
                subscriptions: HashMap::new(),
                closed: None,
            }),
            config,
            next_token: AtomicU64::new(1),
        });

        let weak = Arc::downgrade(&shared);
        std::thread::Builder::new()
            .name("xbee-decode".to_string())
            .spawn(move || decode_loop(weak, reader))
            .map_err(RadioError::Spawn)?;

        debug!("radio started");
        Ok(Self { shared })
    }

    /// Set the radio's 16-bit source address.
    pub fn set_address(&self, addr: u16) -> Result<()> {
        self.command_frame(&Fields::set_address(addr), &[])?;
        debug!(addr, "address set");
        Ok(())
    }

    /// Query the radio's 16-bit source address.
    pub fn address(&self) -> Result<u16> {
        let frame = self.command_frame(&Fields::command(CMD_ADDRESS), &[])?;
        match frame.data() {
            [hi, lo, ..] => Ok(u16::from_be_bytes([*hi, *lo])),
            other => Err(RadioError::UnexpectedResponse(format!(
                "address response carries {} bytes",
                other.len()
            ))),
        }
    }

    /// Set the node identifier reported to peers during discovery.
    ///
    /// Names longer than 20 bytes or containing NUL are rejected without
    /// contacting the radio.
    pub fn set_identifier(&self, name: &str) -> Result<()> {
        if name.len() > MAX_IDENTIFIER_LEN {
            return Err(RadioError::InvalidIdentifier(format!(
                "{} bytes exceeds the {MAX_IDENTIFIER_LEN}-byte limit",
                name.len()
            )));
        }
        if name.contains('\0') {
            return Err(RadioError::InvalidIdentifier(
                "identifier contains NUL".to_string(),
            ));
        }
        self.command_frame(&Fields::set_identifier(name), &[])?;
        debug!(name, "identifier set");
        Ok(())
    }

    /// Query the node identifier.
    pub fn identifier(&self) -> Result<String> {
        let frame = self.command_frame(&Fields::command(CMD_IDENTIFIER), &[])?;
        let data = frame.data();
        let end = data.iter().position(|b| *b == 0).unwrap_or(data.len());
        Ok(String::from_utf8_lossy(&data[..end]).into_owned())
    }

    /// Send an arbitrary two-letter command and return the successful response.
    pub fn command(&self, name: [u8; 2], param: &[u8]) -> Result<Frame> {
        self.command_frame(&Fields::command(name), param)
    }

    /// Discover the peers in range.
    ///
    /// Collects one node per response until the radio signals the end of
    /// discovery, or fails with [`RadioError::Timeout`] if it never does.
    pub fn discover(&self) -> Result<Vec<Node>> {
        let reply = self.request(
            &Fields::node_discover(),
            &[],
            Completion::accumulate(),
            self.shared.config.discovery_timeout,
        )?;
        let Reply::Accumulated(frames) = reply else {
            return Err(RadioError::UnexpectedResponse(
                "discovery completed with a single response".to_string(),
            ));
        };

        let mut nodes = Vec::with_capacity(frames.len());
        for frame in &frames {
            match Node::from_frame(frame) {
                Some(node) => nodes.push(node),
                None => warn!(
                    len = frame.data().len(),
                    "skipping short discovery response"
                ),
            }
        }
        debug!(count = nodes.len(), "discovery finished");
        Ok(nodes)
    }

    /// Transmit one payload to a 16-bit address and wait for the transmit status.
    ///
    /// A failed delivery is reported, not retried.
    pub fn send(&self, addr: u16, payload: &[u8]) -> Result<()> {
        check_payload(payload)?;
        self.transmit(&Fields::tx16(addr, 0), payload)
    }

    /// Transmit one payload to a 64-bit address and wait for the transmit status.
    pub fn send64(&self, addr: u64, payload: &[u8]) -> Result<()> {
        check_payload(payload)?;
        self.transmit(&Fields::tx64(addr, 0), payload)
    }

    /// Receive the data frames sent by `addr`.
    ///
    /// Replaces any earlier listener for the same address, whose receiver then
    /// disconnects. The receiver also disconnects when the radio shuts down.
    pub fn listen(&self, addr: u16) -> Receiver<Frame> {
        let (tx, rx) = mpsc::sync_channel(self.shared.config.subscription_capacity);
        let token = self.shared.token();

        let mut state = self.shared.lock();
        if state.closed.is_some() {
            // The sender drops here, so the receiver reads as disconnected.
            return rx;
        }
        if state
            .subscriptions
            .insert(addr, Subscription { token, tx })
            .is_some()
        {
            debug!(addr, "replaced existing listener");
        }
        rx
    }

    /// A byte stream exchanging data with `addr`.
    pub fn stream(&self, addr: u16) -> RadioStream {
        RadioStream::new(self.clone(), addr)
    }

    /// Whether the decode loop has stopped.
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed.is_some()
    }

    /// Close the radio for every handle.
    ///
    /// Outstanding requests fail with [`RadioError::Disconnected`], listeners
    /// see end-of-stream, and a link opened with [`Radio::open`] is shut down
    /// so the decode thread exits.
    pub fn shutdown(&self) {
        self.shared.shutdown("radio shut down".to_string());
        self.shared.release_link();
    }

    /// Number of requests awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.shared.lock().pending.len()
    }

    pub fn config(&self) -> &RadioConfig {
        &self.shared.config
    }

    fn command_frame(&self, fields: &Fields, data: &[u8]) -> Result<Frame> {
        let reply = self.request(
            fields,
            data,
            Completion::Single,
            self.shared.config.request_timeout,
        )?;
        let frame = single(reply)?;
        frame.status()?;
        Ok(frame)
    }

    fn transmit(&self, fields: &Fields, payload: &[u8]) -> Result<()> {
        let reply = self.request(
            fields,
            payload,
            Completion::Single,
            self.shared.config.request_timeout,
        )?;
        single(reply)?.status()?;
        Ok(())
    }

    /// Send a correlated frame and block for its completion.
    fn request(
        &self,
        fields: &Fields,
        data: &[u8],
        completion: Completion,
        timeout: Duration,
    ) -> Result<Reply> {
        let (tx, rx) = mpsc::channel();
        let token = self.shared.token();

        let id = {
            let mut state = self.shared.lock();
            if let Some(reason) = &state.closed {
                return Err(RadioError::Disconnected(reason.clone()));
            }

            let id = state.sequence.next_id();
            let frame = Frame::build_with_id(id, fields, data)?;
            let request = PendingRequest::new(token, completion, timeout, tx);
            if let Some(displaced) = state.pending.insert(id, request) {
                warn!(id, "correlation id reused while a request was outstanding");
                displaced.fail(RadioError::Superseded(id));
            }

            if let Err(err) = state.writer.write_frame(&frame) {
                state.pending.remove(&id);
                return Err(err.into());
            }
            debug!(id, frame_type = type_name(frame.frame_type()), "request sent");
            id
        };

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                self.shared.remove_pending(id, token);
                // A response may have landed between the timeout and the removal.
                match rx.try_recv() {
                    Ok(result) => result,
                    Err(_) => {
                        debug!(id, ?timeout, "request timed out");
                        Err(RadioError::Timeout(timeout))
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => Err(RadioError::Disconnected(
                "request dropped without a response".to_string(),
            )),
        }
    }
}

impl std::fmt::Debug for Radio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("Radio")
            .field("pending", &state.pending.len())
            .field("subscriptions", &state.subscriptions.len())
            .field("closed", &state.closed)
            .finish()
    }
}

fn check_payload(payload: &[u8]) -> Result<()> {
    if payload.len() > MAX_RF_PAYLOAD {
        return Err(RadioError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_RF_PAYLOAD,
        });
    }
    Ok(())
}

fn single(reply: Reply) -> Result<Frame> {
    match reply {
        Reply::Single(frame) => Ok(frame),
        Reply::Accumulated(frames) => Err(RadioError::UnexpectedResponse(format!(
            "expected one response, got {}",
            frames.len()
        ))),
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn token(&self) -> u64 {
        self.next_token.fetch_add(1, Ordering::Relaxed)
    }

    fn remove_pending(&self, id: u8, token: u64) {
        let mut state = self.lock();
        if state.pending.get(&id).is_some_and(|req| req.token == token) {
            state.pending.remove(&id);
        }
    }

    fn dispatch(&self, frame: Frame) {
        match frame.kind() {
            Some(FrameType::AtResponse | FrameType::TxStatus) => self.complete(frame),
            Some(FrameType::Rx16) => self.deliver(frame),
            Some(FrameType::ModemStatus) => {
                let status = frame.modem_status().unwrap_or_default();
                info!(status, name = modem_status_name(status), "modem status");
            }
            _ => debug!(
                frame_type = type_name(frame.frame_type()),
                "discarding unhandled frame"
            ),
        }
    }

    fn complete(&self, frame: Frame) {
        let Some(id) = frame.id() else {
            return;
        };

        let mut state = self.lock();
        let Some(request) = state.pending.get_mut(&id) else {
            debug!(id, "discarding response with no pending request");
            return;
        };

        if request.is_expired(Instant::now()) {
            debug!(id, "discarding response for expired request");
            if let Some(request) = state.pending.remove(&id) {
                request.expire();
            }
            return;
        }

        if request.on_response(frame) == Progress::Done {
            state.pending.remove(&id);
        }
    }

    fn deliver(&self, frame: Frame) {
        let Some(source) = frame.source16() else {
            return;
        };

        let subscriber = {
            let state = self.lock();
            state
                .subscriptions
                .get(&source)
                .map(|sub| (sub.token, sub.tx.clone()))
        };
        let Some((token, tx)) = subscriber else {
            trace!(source, "no listener, discarding data");
            return;
        };

        // Blocks while the listener's queue is full; the lock is not held.
        if tx.send(frame).is_err() {
            debug!(source, "listener gone, removing subscription");
            let mut state = self.lock();
            if state
                .subscriptions
                .get(&source)
                .is_some_and(|sub| sub.token == token)
            {
                state.subscriptions.remove(&source);
            }
        }
    }

    fn shutdown(&self, reason: String) {
        let mut state = self.lock();
        if state.closed.is_some() {
            return;
        }
        for (_, request) in state.pending.drain() {
            request.fail(RadioError::Disconnected(reason.clone()));
        }
        state.subscriptions.clear();
        state.closed = Some(reason);
    }

    fn release_link(&self) {
        release(&mut self.lock());
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        release(state);
    }
}

fn release(state: &mut State) {
    match state.writer.get_mut().release() {
        Ok(()) => debug!("link released"),
        Err(err) => warn!(error = %err, "failed to release link"),
    }
}

fn decode_loop<R: Read>(shared: Weak<Shared>, mut reader: FrameReader<R>) {
    loop {
        let result = reader.read_frame();
        let Some(shared) = shared.upgrade() else {
            debug!("radio dropped, decode loop exiting");
            return;
        };

        match result {
            Ok(frame) => shared.dispatch(frame),
            Err(err) if err.is_idle_timeout() => continue,
            Err(err) if err.is_recoverable() => {
                warn!(error = %err, "discarding malformed frame");
            }
            Err(FrameError::ConnectionClosed) => {
                debug!("link closed, decode loop exiting");
                shared.shutdown("link closed".to_string());
                return;
            }
            Err(err) => {
                error!(error = %err, "decode loop stopped");
                shared.shutdown(err.to_string());
                return;
            }
        }
    }
}
