//! Stream framing for LLRP over TCP

use super::decode::{parse_u16_be, parse_u32_be};
use super::header::MESSAGE_HEADER_LEN;
use super::message::LlrpMessage;
use crate::EmulatorError;
use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Default cap on inbound message size.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// Splits a byte stream into [`LlrpMessage`]s using the header length field.
///
/// Headers are not interpreted here; an unknown header is framed like any
/// other message and left to the caller.
#[derive(Debug, Clone)]
pub struct LlrpCodec {
    max_message_len: usize,
}

impl LlrpCodec {
    pub fn new(max_message_len: usize) -> Self {
        Self { max_message_len: max_message_len.max(MESSAGE_HEADER_LEN) }
    }
}

impl Default for LlrpCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_LEN)
    }
}

impl Decoder for LlrpCodec {
    type Item = LlrpMessage;
    type Error = EmulatorError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < MESSAGE_HEADER_LEN {
            return Ok(None);
        }

        let length = parse_u32_be(&src[2..6]);
        let len = length as usize;
        if len < MESSAGE_HEADER_LEN || len > self.max_message_len {
            return Err(EmulatorError::FrameLength { length, max: self.max_message_len });
        }
        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }

        let header = parse_u16_be(&src[0..2]);
        let id = parse_u32_be(&src[6..10]);
        let mut frame = src.split_to(len);
        frame.advance(MESSAGE_HEADER_LEN);
        Ok(Some(LlrpMessage { header, id, body: frame.freeze() }))
    }
}

impl Encoder<LlrpMessage> for LlrpCodec {
    type Error = EmulatorError;

    fn encode(&mut self, item: LlrpMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode(dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llrp::MessageType;

    #[test]
    fn waits_for_complete_frame() {
        let bytes = LlrpMessage::set_reader_config(3, 0).to_bytes();
        let mut codec = LlrpCodec::default();

        let mut buf = BytesMut::from(&bytes[..5]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&bytes[5..15]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&bytes[15..]);

        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.message_type(), Some(MessageType::SetReaderConfig));
        assert_eq!(msg.id, 3);
        assert!(buf.is_empty());
    }

    #[test]
    fn splits_back_to_back_messages() {
        let mut buf = BytesMut::new();
        let mut codec = LlrpCodec::default();
        codec.encode(LlrpMessage::keepalive_ack(1), &mut buf).unwrap();
        codec.encode(LlrpMessage::set_reader_config_response(2), &mut buf).unwrap();

        let first = codec.decode(&mut buf).unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first, LlrpMessage::keepalive_ack(1));
        assert_eq!(second, LlrpMessage::set_reader_config_response(2));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn frames_unknown_headers() {
        let mut buf = BytesMut::from(&[0x04, 0x01, 0, 0, 0, 10, 0, 0, 0, 9][..]);
        let msg = LlrpCodec::default().decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.header, 0x0401);
        assert_eq!(msg.message_type(), None);
    }

    #[test]
    fn rejects_bad_lengths() {
        let mut codec = LlrpCodec::new(64);

        let mut short = BytesMut::from(&[0x04, 0x3E, 0, 0, 0, 9, 0, 0, 0, 1][..]);
        assert!(matches!(
            codec.decode(&mut short).unwrap_err(),
            EmulatorError::FrameLength { length: 9, max: 64 }
        ));

        let mut long = BytesMut::from(&[0x04, 0x3D, 0, 0, 0, 65, 0, 0, 0, 1][..]);
        assert!(matches!(codec.decode(&mut long).unwrap_err(), EmulatorError::FrameLength { .. }));
    }
}
