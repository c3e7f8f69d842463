use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result, StatusError};
use crate::escape::{escape_into, START};
use crate::sequence::Sequence;
use crate::types::{
    FrameType, AT_COMMAND, AT_RESPONSE, CMD_ADDRESS, CMD_DISCOVER, CMD_IDENTIFIER, MODEM_STATUS,
    RX16, RX64, TX16, TX64, TX_STATUS,
};

/// Start delimiter (1) + length (2).
pub const HEADER_SIZE: usize = 3;

/// Largest value the length field can hold.
pub const MAX_LENGTH: usize = u16::MAX as usize;

/// Default ceiling on the declared length of an inbound frame.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 512;

/// One unescaped API frame, checksum included.
///
/// Wire format (before escaping):
/// ```text
/// ┌──────┬────────────┬──────┬──────┬─────────────────┬──────────┐
/// │ 0x7E │ Length     │ Type │ Id   │ Fields + Data   │ Checksum │
/// │      │ (2B BE)    │ (1B) │ (1B) │                 │ (1B)     │
/// └──────┴────────────┴──────┴──────┴─────────────────┴──────────┘
/// ```
/// Length counts type through data. Received-data and modem-status frames
/// carry no id; their fields begin at offset 4.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Bytes,
}

impl Frame {
    /// Build a frame, stamping it with the next id from `sequence`.
    pub fn build(sequence: &mut Sequence, fields: &Fields, data: &[u8]) -> Result<Self> {
        Self::build_with_id(sequence.next_id(), fields, data)
    }

    /// Build a frame with an explicit id. An id of zero suppresses the response.
    pub fn build_with_id(id: u8, fields: &Fields, data: &[u8]) -> Result<Self> {
        let mut body = Vec::with_capacity(2 + fields.body.len() + data.len());
        body.push(fields.frame_type);
        body.push(id);
        body.extend_from_slice(&fields.body);
        body.extend_from_slice(data);
        Self::from_body(&body)
    }

    /// Wrap `type .. data` in a start byte, length and checksum.
    pub fn from_body(body: &[u8]) -> Result<Self> {
        if body.is_empty() {
            return Err(FrameError::EmptyFrame);
        }
        if body.len() > MAX_LENGTH {
            return Err(FrameError::PayloadTooLarge {
                size: body.len(),
                max: MAX_LENGTH,
            });
        }

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + body.len() + 1);
        buf.put_u8(START);
        buf.put_u16(body.len() as u16);
        buf.put_slice(body);
        buf.put_u8(checksum_of(body));
        Ok(Self {
            bytes: buf.freeze(),
        })
    }

    /// Parse and validate a complete unescaped frame.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() < HEADER_SIZE {
            return Err(FrameError::Incomplete);
        }
        if bytes[0] != START {
            return Err(FrameError::InvalidStart(bytes[0]));
        }

        let declared = u16::from_be_bytes([bytes[1], bytes[2]]) as usize;
        if declared == 0 {
            return Err(FrameError::EmptyFrame);
        }
        let actual = bytes.len().saturating_sub(HEADER_SIZE + 1);
        if declared != actual {
            return Err(FrameError::LengthMismatch { declared, actual });
        }

        let last = bytes.len() - 1;
        let expected = checksum_of(&bytes[HEADER_SIZE..last]);
        if bytes[last] != expected {
            return Err(FrameError::Checksum {
                expected,
                actual: bytes[last],
            });
        }

        Ok(Self { bytes })
    }

    /// Received 16-bit addressed data, as the radio would deliver it.
    pub fn received16(source: u16, rssi: u8, options: u8, data: &[u8]) -> Result<Self> {
        let mut body = Vec::with_capacity(5 + data.len());
        body.push(RX16);
        body.extend_from_slice(&source.to_be_bytes());
        body.push(rssi);
        body.push(options);
        body.extend_from_slice(data);
        Self::from_body(&body)
    }

    /// Received 64-bit addressed data.
    pub fn received64(source: u64, rssi: u8, options: u8, data: &[u8]) -> Result<Self> {
        let mut body = Vec::with_capacity(11 + data.len());
        body.push(RX64);
        body.extend_from_slice(&source.to_be_bytes());
        body.push(rssi);
        body.push(options);
        body.extend_from_slice(data);
        Self::from_body(&body)
    }

    /// Unsolicited modem status.
    pub fn modem(status: u8) -> Result<Self> {
        Self::from_body(&[MODEM_STATUS, status])
    }

    /// The unescaped frame, start byte through checksum.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    /// Unescaped size on the wire.
    pub fn wire_size(&self) -> usize {
        self.bytes.len()
    }

    /// Value of the length field.
    pub fn length(&self) -> u16 {
        u16::from_be_bytes([self.bytes[1], self.bytes[2]])
    }

    pub fn frame_type(&self) -> u8 {
        self.bytes[HEADER_SIZE]
    }

    pub fn kind(&self) -> Option<FrameType> {
        FrameType::from_u8(self.frame_type())
    }

    /// Type through data, without the checksum.
    pub fn body(&self) -> &[u8] {
        &self.bytes[HEADER_SIZE..self.bytes.len() - 1]
    }

    /// Correlation id, for frame types that carry one.
    pub fn id(&self) -> Option<u8> {
        if self.kind().is_some_and(|kind| !kind.has_id()) {
            return None;
        }
        self.byte(4)
    }

    pub fn source16(&self) -> Option<u16> {
        match self.frame_type() {
            RX16 => self.u16_at(4),
            _ => None,
        }
    }

    pub fn source64(&self) -> Option<u64> {
        match self.frame_type() {
            RX64 => self.u64_at(4),
            _ => None,
        }
    }

    pub fn destination16(&self) -> Option<u16> {
        match self.frame_type() {
            TX16 => self.u16_at(5),
            _ => None,
        }
    }

    pub fn destination64(&self) -> Option<u64> {
        match self.frame_type() {
            TX64 => self.u64_at(5),
            _ => None,
        }
    }

    /// Received signal strength as reported (magnitude of -dBm).
    pub fn rssi(&self) -> Option<u8> {
        match self.frame_type() {
            RX16 => self.byte(6),
            RX64 => self.byte(12),
            _ => None,
        }
    }

    pub fn options(&self) -> Option<u8> {
        match self.frame_type() {
            RX16 | TX16 => self.byte(7),
            RX64 | TX64 => self.byte(13),
            _ => None,
        }
    }

    /// Two-letter command name of a command request or response.
    pub fn command(&self) -> Option<[u8; 2]> {
        match self.frame_type() {
            AT_COMMAND | AT_RESPONSE => Some([self.byte(5)?, self.byte(6)?]),
            _ => None,
        }
    }

    pub fn modem_status(&self) -> Option<u8> {
        match self.frame_type() {
            MODEM_STATUS => self.byte(4),
            _ => None,
        }
    }

    /// Opaque payload following the type-specific fields.
    ///
    /// Empty when the frame is too short to reach its payload.
    pub fn data(&self) -> &[u8] {
        let end = self.bytes.len() - 1;
        let start = (HEADER_SIZE + self.data_offset()).min(end);
        &self.bytes[start..end]
    }

    /// Sum of every byte from type through checksum, modulo 256.
    pub fn sum(&self) -> u8 {
        sum_of(&self.bytes[HEADER_SIZE..])
    }

    pub fn checksum(&self) -> u8 {
        self.bytes[self.bytes.len() - 1]
    }

    /// Whether the checksum and length field agree with the contents.
    ///
    /// The checksum is a plain additive sum: it catches any single corrupted
    /// byte but not offsetting corruption across several.
    pub fn valid(&self) -> bool {
        self.sum() == 0xFF && self.length() as usize == self.bytes.len() - HEADER_SIZE - 1
    }

    /// Outcome reported by a command response or transmit status frame.
    ///
    /// Frame types without a status byte always report `Ok`.
    pub fn status(&self) -> std::result::Result<(), StatusError> {
        let frame_type = self.frame_type();
        let offset = match frame_type {
            AT_RESPONSE => 7,
            TX_STATUS => 5,
            _ => return Ok(()),
        };
        let status = self
            .byte(offset)
            .ok_or(StatusError::Missing { frame_type })?;

        match (frame_type, status) {
            (_, 0) => Ok(()),
            (AT_RESPONSE, 1) => Err(StatusError::CommandFailed),
            (AT_RESPONSE, 2) => Err(StatusError::InvalidCommand),
            (AT_RESPONSE, 3) => Err(StatusError::InvalidParameter),
            (TX_STATUS, 1) => Err(StatusError::NoAck),
            (TX_STATUS, 2) => Err(StatusError::ChannelAccessFailure),
            (TX_STATUS, 3) => Err(StatusError::Purged),
            _ => Err(StatusError::Unexpected { frame_type, status }),
        }
    }

    /// Append the escaped wire form to `dst`.
    pub fn encode_to(&self, dst: &mut BytesMut) {
        dst.reserve(self.bytes.len() + 4);
        dst.put_u8(START);
        escape_into(&self.bytes[1..], dst);
    }

    // Offset of the payload, counted from the type byte.
    fn data_offset(&self) -> usize {
        match self.frame_type() {
            TX64 => 11,
            TX16 => 5,
            AT_COMMAND => 4,
            RX64 => 11,
            RX16 => 5,
            AT_RESPONSE => 5,
            TX_STATUS => 3,
            MODEM_STATUS => 2,
            _ => 2,
        }
    }

    // Absolute offset into the frame, bounded by the checksum.
    fn byte(&self, offset: usize) -> Option<u8> {
        if offset < self.bytes.len() - 1 {
            Some(self.bytes[offset])
        } else {
            None
        }
    }

    fn u16_at(&self, offset: usize) -> Option<u16> {
        Some(u16::from_be_bytes([self.byte(offset)?, self.byte(offset + 1)?]))
    }

    fn u64_at(&self, offset: usize) -> Option<u64> {
        let end = offset + 8;
        if end > self.bytes.len() - 1 {
            return None;
        }
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.bytes[offset..end]);
        Some(u64::from_be_bytes(raw))
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("type", &crate::types::type_name(self.frame_type()))
            .field("id", &self.id())
            .field("bytes", &format_args!("{:02x?}", self.bytes.as_ref()))
            .finish()
    }
}

/// Type-specific fields placed between the id and the payload.
///
/// Only the constructors below produce these, so every field has the width
/// its frame type expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fields {
    frame_type: u8,
    body: Vec<u8>,
}

impl Fields {
    /// Generic two-letter command. A parameter, if any, goes in the frame data.
    pub fn command(name: [u8; 2]) -> Self {
        Self {
            frame_type: AT_COMMAND,
            body: name.to_vec(),
        }
    }

    /// `MY` with the new 16-bit source address.
    pub fn set_address(addr: u16) -> Self {
        let mut body = CMD_ADDRESS.to_vec();
        body.extend_from_slice(&addr.to_be_bytes());
        Self {
            frame_type: AT_COMMAND,
            body,
        }
    }

    /// `ND`.
    pub fn node_discover() -> Self {
        Self::command(CMD_DISCOVER)
    }

    /// `NI` with the new identifier.
    pub fn set_identifier(name: &str) -> Self {
        let mut body = CMD_IDENTIFIER.to_vec();
        body.extend_from_slice(name.as_bytes());
        Self {
            frame_type: AT_COMMAND,
            body,
        }
    }

    /// 16-bit addressed transmit request.
    pub fn tx16(dest: u16, options: u8) -> Self {
        let mut body = dest.to_be_bytes().to_vec();
        body.push(options);
        Self {
            frame_type: TX16,
            body,
        }
    }

    /// 64-bit addressed transmit request.
    pub fn tx64(dest: u64, options: u8) -> Self {
        let mut body = dest.to_be_bytes().to_vec();
        body.push(options);
        Self {
            frame_type: TX64,
            body,
        }
    }

    /// Command response, as the radio would send it.
    pub fn at_response(name: [u8; 2], status: u8) -> Self {
        let mut body = name.to_vec();
        body.push(status);
        Self {
            frame_type: AT_RESPONSE,
            body,
        }
    }

    /// Transmit status, as the radio would send it.
    pub fn tx_status(status: u8) -> Self {
        Self {
            frame_type: TX_STATUS,
            body: vec![status],
        }
    }

    pub fn frame_type(&self) -> u8 {
        self.frame_type
    }
}

/// Configuration for frame decoding.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Largest declared length accepted from the link. Default: 512.
    pub max_frame_length: usize,
}

impl FrameConfig {
    pub fn with_max_frame_length(mut self, max: usize) -> Self {
        self.max_frame_length = max.clamp(1, MAX_LENGTH);
        self
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }
}

fn sum_of(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

fn checksum_of(body: &[u8]) -> u8 {
    0xFF - sum_of(body)
}
