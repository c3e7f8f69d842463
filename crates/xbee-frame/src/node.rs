use serde::{Deserialize, Serialize};

use crate::codec::Frame;

/// Shortest discovery payload: address (2) + serial (8) + rssi (1).
pub const MIN_NODE_PAYLOAD: usize = 11;

/// A peer found by node discovery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    /// 16-bit short address.
    pub address: u16,
    /// 64-bit serial number.
    pub serial: u64,
    /// Node identifier string.
    pub identifier: String,
    /// Signal strength of the discovery reply, as -dBm.
    pub rssi: u8,
}

impl Node {
    /// Decode the node carried by a discovery response.
    ///
    /// Returns `None` for the empty terminal response.
    pub fn from_frame(frame: &Frame) -> Option<Self> {
        Self::parse(frame.data())
    }

    /// Decode a discovery payload: address, serial, rssi, then a
    /// NUL-terminated identifier.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < MIN_NODE_PAYLOAD {
            return None;
        }

        let address = u16::from_be_bytes([data[0], data[1]]);
        let mut serial = [0u8; 8];
        serial.copy_from_slice(&data[2..10]);
        let rssi = data[10];

        let name = &data[MIN_NODE_PAYLOAD..];
        let name = name
            .iter()
            .position(|b| *b == 0)
            .map_or(name, |end| &name[..end]);

        Some(Self {
            address,
            serial: u64::from_be_bytes(serial),
            identifier: String::from_utf8_lossy(name).into_owned(),
            rssi,
        })
    }

    /// Encode as a discovery payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MIN_NODE_PAYLOAD + self.identifier.len() + 1);
        out.extend_from_slice(&self.address.to_be_bytes());
        out.extend_from_slice(&self.serial.to_be_bytes());
        out.push(self.rssi);
        out.extend_from_slice(self.identifier.as_bytes());
        out.push(0);
        out
    }

    /// Signal strength in dBm.
    pub fn rssi_dbm(&self) -> i16 {
        -i16::from(self.rssi)
    }
}
