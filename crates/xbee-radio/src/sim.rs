//! A simulated transceiver on the far end of a socket pair.

use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use xbee_frame::types::{AT_COMMAND, AT_RESPONSE, TX16, TX64};
use xbee_frame::{Fields, Frame, FrameReader, FrameWriter};

pub(crate) struct Device {
    control: UnixStream,
    writer: Arc<Mutex<FrameWriter<UnixStream>>>,
    received: Arc<Mutex<Vec<Frame>>>,
    _thread: JoinHandle<()>,
}

/// Spawn a device that answers every frame it decodes with `handler`'s frames.
///
/// Returns the radio's end of the link.
pub(crate) fn spawn<F>(mut handler: F) -> (UnixStream, Device)
where
    F: FnMut(&Frame) -> Vec<Frame> + Send + 'static,
{
    let (radio_end, device_end) = UnixStream::pair().unwrap();
    let control = device_end.try_clone().unwrap();
    let mut reader = FrameReader::new(device_end.try_clone().unwrap());
    let writer = Arc::new(Mutex::new(FrameWriter::new(device_end)));
    let received = Arc::new(Mutex::new(Vec::new()));

    let thread = {
        let writer = Arc::clone(&writer);
        let received = Arc::clone(&received);
        std::thread::spawn(move || {
            while let Ok(frame) = reader.read_frame() {
                let replies = handler(&frame);
                received.lock().unwrap().push(frame);
                let mut writer = writer.lock().unwrap();
                for reply in replies {
                    if writer.write_frame(&reply).is_err() {
                        return;
                    }
                }
            }
        })
    };

    (
        radio_end,
        Device {
            control,
            writer,
            received,
            _thread: thread,
        },
    )
}

impl Device {
    /// Frames the radio has sent so far.
    pub(crate) fn received(&self) -> Vec<Frame> {
        self.received.lock().unwrap().clone()
    }

    /// Send an unsolicited frame to the radio.
    pub(crate) fn inject(&self, frame: &Frame) {
        self.writer.lock().unwrap().write_frame(frame).unwrap();
    }

    /// Send raw bytes to the radio, bypassing framing.
    pub(crate) fn inject_raw(&self, bytes: &[u8]) {
        use std::io::Write;
        let mut writer = self.writer.lock().unwrap();
        writer.get_mut().write_all(bytes).unwrap();
    }

    /// Wait until at least `count` frames have arrived.
    pub(crate) fn wait_for(&self, count: usize, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        while self.received.lock().unwrap().len() < count {
            assert!(Instant::now() < deadline, "device saw fewer than {count} frames");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    /// Hang up the link.
    pub(crate) fn close(&self) {
        let _ = self.control.shutdown(Shutdown::Both);
    }
}

/// Answer commands and transmissions with a success status.
pub(crate) fn acknowledge(frame: &Frame) -> Vec<Frame> {
    respond(frame, 0, &[])
}

/// Answer commands and transmissions with `status`, attaching `data` to
/// command responses.
pub(crate) fn respond(frame: &Frame, status: u8, data: &[u8]) -> Vec<Frame> {
    let Some(id) = frame.id().filter(|id| *id != 0) else {
        return Vec::new();
    };
    let fields = match frame.frame_type() {
        AT_COMMAND => match frame.command() {
            Some(name) => Fields::at_response(name, status),
            None => return Vec::new(),
        },
        TX16 | TX64 => Fields::tx_status(status),
        _ => return Vec::new(),
    };
    let data = if fields.frame_type() == AT_RESPONSE {
        data
    } else {
        &[]
    };
    vec![Frame::build_with_id(id, &fields, data).unwrap()]
}
