//! API frame type identifiers and well-known command names.

/// 64-bit addressed transmit request.
pub const TX64: u8 = 0x00;

/// 16-bit addressed transmit request.
pub const TX16: u8 = 0x01;

/// Local AT command request.
pub const AT_COMMAND: u8 = 0x08;

/// Received packet, 64-bit source address.
pub const RX64: u8 = 0x80;

/// Received packet, 16-bit source address.
pub const RX16: u8 = 0x81;

/// Local AT command response.
pub const AT_RESPONSE: u8 = 0x88;

/// Transmit status for a TX64/TX16 request.
pub const TX_STATUS: u8 = 0x89;

/// Unsolicited modem status.
pub const MODEM_STATUS: u8 = 0x8A;

/// Set or query the 16-bit source address.
pub const CMD_ADDRESS: [u8; 2] = *b"MY";

/// Set or query the node identifier string.
pub const CMD_IDENTIFIER: [u8; 2] = *b"NI";

/// Node discovery.
pub const CMD_DISCOVER: [u8; 2] = *b"ND";

/// Largest RF payload a single transmit request may carry.
pub const MAX_RF_PAYLOAD: usize = 100;

/// Longest node identifier the radio accepts.
pub const MAX_IDENTIFIER_LEN: usize = 20;

/// Frame types this stack knows how to build or dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    Tx64,
    Tx16,
    AtCommand,
    Rx64,
    Rx16,
    AtResponse,
    TxStatus,
    ModemStatus,
}

impl FrameType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            TX64 => Some(Self::Tx64),
            TX16 => Some(Self::Tx16),
            AT_COMMAND => Some(Self::AtCommand),
            RX64 => Some(Self::Rx64),
            RX16 => Some(Self::Rx16),
            AT_RESPONSE => Some(Self::AtResponse),
            TX_STATUS => Some(Self::TxStatus),
            MODEM_STATUS => Some(Self::ModemStatus),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Tx64 => TX64,
            Self::Tx16 => TX16,
            Self::AtCommand => AT_COMMAND,
            Self::Rx64 => RX64,
            Self::Rx16 => RX16,
            Self::AtResponse => AT_RESPONSE,
            Self::TxStatus => TX_STATUS,
            Self::ModemStatus => MODEM_STATUS,
        }
    }

    /// Human-readable name for logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Tx64 => "TX64",
            Self::Tx16 => "TX16",
            Self::AtCommand => "AT_COMMAND",
            Self::Rx64 => "RX64",
            Self::Rx16 => "RX16",
            Self::AtResponse => "AT_RESPONSE",
            Self::TxStatus => "TX_STATUS",
            Self::ModemStatus => "MODEM_STATUS",
        }
    }

    /// Whether byte 4 of this frame type is a correlation id.
    ///
    /// Received-data and modem-status frames start their fields at byte 4.
    pub fn has_id(self) -> bool {
        !matches!(self, Self::Rx64 | Self::Rx16 | Self::ModemStatus)
    }
}

/// Returns a human-readable name for a raw frame type byte.
pub fn type_name(value: u8) -> &'static str {
    FrameType::from_u8(value).map_or("UNKNOWN", FrameType::name)
}

/// Returns a human-readable name for a modem status byte.
pub fn modem_status_name(status: u8) -> &'static str {
    match status {
        0x00 => "hardware reset",
        0x01 => "watchdog timer reset",
        0x02 => "associated",
        0x03 => "disassociated",
        0x04 => "synchronization lost",
        0x05 => "coordinator realignment",
        0x06 => "coordinator started",
        _ => "unknown",
    }
}
