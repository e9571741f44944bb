//! Top-level LLRP messages

use super::header::{MESSAGE_HEADER_LEN, MessageType};
use super::param;
use bytes::{BufMut, Bytes, BytesMut};

/// One framed LLRP message.
///
/// `header` is the raw `Rsvd+Ver+Type` field so that inbound messages with an
/// unrecognised header can still be framed and reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlrpMessage {
    pub header: u16,
    pub id: u32,
    pub body: Bytes,
}

impl LlrpMessage {
    pub fn new(kind: MessageType, id: u32, body: impl Into<Bytes>) -> Self {
        Self { header: kind.header(), id, body: body.into() }
    }

    /// The message type, or `None` for an unknown header.
    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::from_header(self.header)
    }

    /// Total encoded length including the 10 byte header.
    pub fn encoded_len(&self) -> usize {
        MESSAGE_HEADER_LEN + self.body.len()
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(self.encoded_len());
        dst.put_u16(self.header);
        dst.put_u32(self.encoded_len() as u32);
        dst.put_u32(self.id);
        dst.put_slice(&self.body);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// READER_EVENT_NOTIFICATION announcing a successful connection attempt.
    pub fn reader_event_notification(id: u32, timestamp_micros: u64) -> Self {
        let mut body = BytesMut::with_capacity(22);
        param::put_reader_event_notification_data(&mut body, timestamp_micros);
        Self::new(MessageType::ReaderEventNotification, id, body.freeze())
    }

    pub fn keepalive(id: u32) -> Self {
        Self::new(MessageType::Keepalive, id, Bytes::new())
    }

    pub fn keepalive_ack(id: u32) -> Self {
        Self::new(MessageType::KeepaliveAck, id, Bytes::new())
    }

    /// SET_READER_CONFIG carrying a periodic KeepaliveSpec.
    pub fn set_reader_config(id: u32, keepalive_interval_ms: u32) -> Self {
        let mut body = BytesMut::with_capacity(10);
        body.put_u8(0); // RestoreFactorySettings = false
        param::put_keepalive_spec(&mut body, keepalive_interval_ms);
        Self::new(MessageType::SetReaderConfig, id, body.freeze())
    }

    pub fn set_reader_config_response(id: u32) -> Self {
        let mut body = BytesMut::with_capacity(8);
        param::put_llrp_status_success(&mut body);
        Self::new(MessageType::SetReaderConfigResponse, id, body.freeze())
    }

    /// RO_ACCESS_REPORT whose body is a pre-encoded run of TagReportData.
    pub fn ro_access_report(id: u32, payload: Bytes) -> Self {
        Self::new(MessageType::RoAccessReport, id, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keepalive_is_header_only() {
        let bytes = LlrpMessage::keepalive(80000).to_bytes();
        assert_eq!(bytes.as_ref(), &[0x04, 0x3E, 0, 0, 0, 10, 0x00, 0x01, 0x38, 0x80]);

        let ack = LlrpMessage::keepalive_ack(7).to_bytes();
        assert_eq!(&ack[..2], &[0x04, 0x48]);
    }

    #[test]
    fn reader_event_notification_header() {
        let msg = LlrpMessage::reader_event_notification(1000, 0);
        let bytes = msg.to_bytes();
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[..10], &[0x04, 0x3F, 0, 0, 0, 32, 0, 0, 0x03, 0xE8]);
        assert_eq!(msg.message_type(), Some(MessageType::ReaderEventNotification));
    }

    #[test]
    fn set_reader_config_round_trip_lengths() {
        let msg = LlrpMessage::set_reader_config(1, 10_000);
        assert_eq!(msg.encoded_len(), 20);
        assert_eq!(&msg.to_bytes()[..6], &[0x04, 0x03, 0, 0, 0, 20]);

        let resp = LlrpMessage::set_reader_config_response(2);
        assert_eq!(resp.encoded_len(), 18);
        assert_eq!(&resp.to_bytes()[10..12], &[0x01, 0x1F]);
    }

    #[test]
    fn report_wraps_payload_verbatim() {
        let payload = Bytes::from_static(&[0, 240, 0, 4]);
        let bytes = LlrpMessage::ro_access_report(5, payload.clone()).to_bytes();
        assert_eq!(&bytes[..2], &[0x04, 0x3D]);
        assert_eq!(&bytes[10..], payload.as_ref());
    }

    #[test]
    fn unknown_header_has_no_type() {
        let msg = LlrpMessage { header: 0x0401, id: 1, body: Bytes::new() };
        assert_eq!(msg.message_type(), None);
    }
}
