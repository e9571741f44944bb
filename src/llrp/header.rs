//! Message header constants
//!
//! The first two bytes of every LLRP message pack three reserved bits, a three
//! bit protocol version and a ten bit message type. This emulator only speaks
//! version 1, so each supported message type has exactly one valid header value.

use std::fmt;

/// Protocol version written into every outbound header (LLRP 1.0.1).
pub const LLRP_VERSION: u16 = 1;

/// Size of `Rsvd+Ver+Type` + `Length` + `MessageID`.
pub const MESSAGE_HEADER_LEN: usize = 10;

const TYPE_MASK: u16 = 0x03FF;

/// Message types the emulator produces or understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageType {
    SetReaderConfig = 3,
    SetReaderConfigResponse = 13,
    RoAccessReport = 61,
    Keepalive = 62,
    ReaderEventNotification = 63,
    KeepaliveAck = 72,
}

impl MessageType {
    pub const ALL: [MessageType; 6] = [
        MessageType::SetReaderConfig,
        MessageType::SetReaderConfigResponse,
        MessageType::RoAccessReport,
        MessageType::Keepalive,
        MessageType::ReaderEventNotification,
        MessageType::KeepaliveAck,
    ];

    /// Ten bit message type code.
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Full `Rsvd+Ver+Type` field, e.g. 1087 for READER_EVENT_NOTIFICATION.
    pub const fn header(self) -> u16 {
        (LLRP_VERSION << 10) | (self as u16 & TYPE_MASK)
    }

    /// Resolve a raw header field. Anything that is not one of the exact
    /// version 1 header values is unknown.
    pub fn from_header(header: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.header() == header)
    }

    /// Name as used in the LLRP specification.
    pub const fn name(self) -> &'static str {
        match self {
            MessageType::SetReaderConfig => "SET_READER_CONFIG",
            MessageType::SetReaderConfigResponse => "SET_READER_CONFIG_RESPONSE",
            MessageType::RoAccessReport => "RO_ACCESS_REPORT",
            MessageType::Keepalive => "KEEPALIVE",
            MessageType::ReaderEventNotification => "READER_EVENT_NOTIFICATION",
            MessageType::KeepaliveAck => "KEEPALIVE_ACK",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_values_match_llrp_1_0_1() {
        assert_eq!(MessageType::SetReaderConfig.header(), 1027);
        assert_eq!(MessageType::SetReaderConfigResponse.header(), 1037);
        assert_eq!(MessageType::RoAccessReport.header(), 1085);
        assert_eq!(MessageType::Keepalive.header(), 1086);
        assert_eq!(MessageType::ReaderEventNotification.header(), 0x043F);
        assert_eq!(MessageType::KeepaliveAck.header(), 1096);
    }

    #[test]
    fn from_header_round_trips_every_type() {
        for kind in MessageType::ALL {
            assert_eq!(MessageType::from_header(kind.header()), Some(kind));
        }
    }

    #[test]
    fn from_header_rejects_other_versions_and_types() {
        // Right type code, wrong version
        assert_eq!(MessageType::from_header((2 << 10) | 3), None);
        // Reserved bits set
        assert_eq!(MessageType::from_header(0x8000 | MessageType::Keepalive.header()), None);
        // GET_READER_CAPABILITIES is valid LLRP but not handled here
        assert_eq!(MessageType::from_header(1025), None);
        assert_eq!(MessageType::from_header(0), None);
    }
}
