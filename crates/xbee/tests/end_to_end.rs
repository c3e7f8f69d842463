//! Two radios talking through a simulated shared channel.

#![cfg(unix)]

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use xbee::frame::types::{AT_COMMAND, CMD_ADDRESS, CMD_DISCOVER, CMD_IDENTIFIER, TX16};
use xbee::frame::{Fields, FrameReader, FrameWriter};
use xbee::{Frame, Node, Radio, RadioConfig, RadioError, StatusError};

const UNSET: u16 = 0xFFFE;

/// Every attached transceiver, as seen by the others.
#[derive(Default)]
struct Air {
    stations: Mutex<Vec<Station>>,
}

struct Station {
    address: u16,
    serial: u64,
    identifier: String,
    writer: Arc<Mutex<FrameWriter<UnixStream>>>,
}

impl Air {
    /// Attach a transceiver and return a radio driving it.
    fn attach(self: &Arc<Self>, serial: u64) -> Radio {
        let (radio_end, device_end) = UnixStream::pair().unwrap();
        let mut reader = FrameReader::new(device_end.try_clone().unwrap());
        let writer = Arc::new(Mutex::new(FrameWriter::new(device_end)));

        let index = {
            let mut stations = self.stations.lock().unwrap();
            stations.push(Station {
                address: UNSET,
                serial,
                identifier: String::new(),
                writer: Arc::clone(&writer),
            });
            stations.len() - 1
        };

        let air = Arc::clone(self);
        std::thread::spawn(move || {
            while let Ok(frame) = reader.read_frame() {
                for reply in air.handle(index, &frame) {
                    if writer.lock().unwrap().write_frame(&reply).is_err() {
                        return;
                    }
                }
            }
        });

        let config = RadioConfig::default()
            .with_request_timeout(Duration::from_secs(2))
            .with_discovery_timeout(Duration::from_secs(2));
        Radio::open_with_config(radio_end, config).unwrap()
    }

    fn handle(&self, index: usize, frame: &Frame) -> Vec<Frame> {
        let id = frame.id().unwrap_or(0);
        let mut stations = self.stations.lock().unwrap();

        match (frame.frame_type(), frame.command()) {
            (AT_COMMAND, Some(CMD_ADDRESS)) => {
                let data = match frame.data() {
                    [hi, lo] => {
                        stations[index].address = u16::from_be_bytes([*hi, *lo]);
                        Vec::new()
                    }
                    _ => stations[index].address.to_be_bytes().to_vec(),
                };
                vec![response(id, CMD_ADDRESS, &data)]
            }
            (AT_COMMAND, Some(CMD_IDENTIFIER)) => {
                stations[index].identifier = String::from_utf8_lossy(frame.data()).into_owned();
                vec![response(id, CMD_IDENTIFIER, &[])]
            }
            (AT_COMMAND, Some(CMD_DISCOVER)) => {
                let mut replies: Vec<Frame> = stations
                    .iter()
                    .enumerate()
                    .filter(|(i, s)| *i != index && s.address != UNSET)
                    .map(|(_, s)| {
                        let node = Node {
                            address: s.address,
                            serial: s.serial,
                            identifier: s.identifier.clone(),
                            rssi: 0x2A,
                        };
                        response(id, CMD_DISCOVER, &node.encode())
                    })
                    .collect();
                replies.push(response(id, CMD_DISCOVER, &[]));
                replies
            }
            (TX16, _) => {
                let source = stations[index].address;
                let dest = frame.destination16();
                let target = stations.iter().find(|s| Some(s.address) == dest);
                let status = match target {
                    Some(target) => {
                        let rx = Frame::received16(source, 0x2A, 0, frame.data()).unwrap();
                        target.writer.lock().unwrap().write_frame(&rx).unwrap();
                        0
                    }
                    None => 1,
                };
                vec![Frame::build_with_id(id, &Fields::tx_status(status), &[]).unwrap()]
            }
            _ => Vec::new(),
        }
    }
}

fn response(id: u8, name: [u8; 2], data: &[u8]) -> Frame {
    Frame::build_with_id(id, &Fields::at_response(name, 0), data).unwrap()
}

fn pair() -> (Radio, Radio) {
    let air = Arc::new(Air::default());
    let alpha = air.attach(0x0013_A200_0000_0001);
    let beta = air.attach(0x0013_A200_0000_0002);
    alpha.set_address(0x3344).unwrap();
    alpha.set_identifier("alpha").unwrap();
    beta.set_address(0x1122).unwrap();
    beta.set_identifier("beta").unwrap();
    (alpha, beta)
}

#[test]
fn radios_discover_each_other() {
    let (alpha, beta) = pair();

    assert_eq!(alpha.address().unwrap(), 0x3344);
    assert_eq!(
        alpha.discover().unwrap(),
        vec![Node {
            address: 0x1122,
            serial: 0x0013_A200_0000_0002,
            identifier: "beta".to_string(),
            rssi: 0x2A,
        }]
    );

    let seen = beta.discover().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].identifier, "alpha");
    assert_eq!(seen[0].rssi_dbm(), -42);
}

#[test]
fn streams_carry_bytes_both_ways() {
    let (alpha, beta) = pair();
    let mut to_beta = alpha.stream(0x1122);
    let mut to_alpha = beta.stream(0x3344);

    let payload: Vec<u8> = (0..250u32).map(|i| (i * 7 % 256) as u8).collect();
    to_beta.write_all(&payload).unwrap();

    let mut received = vec![0u8; payload.len()];
    to_alpha.read_exact(&mut received).unwrap();
    assert_eq!(received, payload);

    to_alpha.write_all(b"ack").unwrap();
    let mut ack = [0u8; 3];
    to_beta.read_exact(&mut ack).unwrap();
    assert_eq!(&ack, b"ack");
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Packet {
    sequence: u32,
    payload: String,
}

#[test]
fn json_values_over_a_stream() {
    let (alpha, beta) = pair();
    let mut sender = alpha.stream(0x1122).with_max_payload(16);
    let receiver = beta.stream(0x3344);

    let packets: Vec<Packet> = (0..3)
        .map(|sequence| Packet {
            sequence,
            payload: format!("hello #{sequence} with enough text to span frames"),
        })
        .collect();
    for packet in &packets {
        let encoded = serde_json::to_vec(packet).unwrap();
        sender.write_all(&encoded).unwrap();
    }

    let decoded: Vec<Packet> = serde_json::Deserializer::from_reader(receiver)
        .into_iter::<Packet>()
        .take(3)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(decoded, packets);
}

#[test]
fn send_to_absent_peer_reports_no_ack() {
    let (alpha, _beta) = pair();
    let err = alpha.send(0x7777, b"anyone?").unwrap_err();
    assert!(matches!(err, RadioError::Status(StatusError::NoAck)));
}
