//! Parameter encoders
//!
//! TLV parameters carry `u16 type` + `u16 length` (length covers the whole
//! parameter). TV parameters are a single `0x80 | type` byte followed by a
//! payload whose size is fixed by the type.

use crate::tag::Tag;
use bytes::{BufMut, Bytes, BytesMut};

/// TLV parameter type codes.
pub mod tlv {
    pub const UTC_TIMESTAMP: u16 = 128;
    pub const KEEPALIVE_SPEC: u16 = 220;
    pub const TAG_REPORT_DATA: u16 = 240;
    pub const EPC_DATA: u16 = 241;
    pub const READER_EVENT_NOTIFICATION_DATA: u16 = 246;
    pub const CONNECTION_ATTEMPT_EVENT: u16 = 256;
    pub const LLRP_STATUS: u16 = 287;
    pub const C1G2_READ_OP_SPEC_RESULT: u16 = 349;
}

/// TV marker bytes (`0x80 | type`).
pub mod tv {
    pub const PEAK_RSSI: u8 = 0x80 | 6;
    pub const C1G2_PC: u8 = 0x80 | 12;
    pub const EPC_96: u8 = 0x80 | 13;
}

/// Placeholder PeakRSSI value (-53 dBm).
pub const PEAK_RSSI: u8 = 203;

/// OpSpecID reported for read results.
pub const READ_OP_SPEC_ID: u16 = 9;

/// ConnectionAttemptEvent status: success.
pub const CONNECTION_SUCCESS: u16 = 0;

/// KeepaliveSpec trigger type: periodic.
pub const KEEPALIVE_TRIGGER_PERIODIC: u8 = 1;

const TLV_HEADER_LEN: usize = 4;

/// Size of the EPC parameter for an EPC of `epc_len` bytes.
pub fn epc_param_len(epc_len: usize) -> usize {
    if epc_len == 12 { 13 } else { TLV_HEADER_LEN + 2 + epc_len }
}

/// Size of a C1G2ReadOpSpecResult carrying `data_len` bytes, or 0 when empty.
pub fn read_op_result_len(data_len: usize) -> usize {
    if data_len == 0 { 0 } else { TLV_HEADER_LEN + 5 + data_len }
}

/// Encoded size of a tag's TagReportData parameter.
pub fn tag_report_data_len(tag: &Tag) -> usize {
    TLV_HEADER_LEN
        + epc_param_len(tag.epc().len())
        + 2 // PeakRSSI
        + 3 // C1G2-PC
        + read_op_result_len(tag.read_data().len())
}

/// Append the EPC parameter: EPC-96 for 96-bit EPCs, EPCData otherwise.
pub fn put_epc(buf: &mut BytesMut, epc: &[u8]) {
    if epc.len() == 12 {
        buf.put_u8(tv::EPC_96);
        buf.put_slice(epc);
    } else {
        buf.put_u16(tlv::EPC_DATA);
        buf.put_u16(epc_param_len(epc.len()) as u16);
        buf.put_u16((epc.len() * 8) as u16);
        buf.put_slice(epc);
    }
}

pub fn put_peak_rssi(buf: &mut BytesMut) {
    buf.put_u8(tv::PEAK_RSSI);
    buf.put_u8(PEAK_RSSI);
}

pub fn put_c1g2_pc(buf: &mut BytesMut, pc_bits: u16) {
    buf.put_u8(tv::C1G2_PC);
    buf.put_u16(pc_bits);
}

/// Append a successful C1G2ReadOpSpecResult. Nothing is written for empty data.
pub fn put_read_op_result(buf: &mut BytesMut, data: &[u8]) {
    if data.is_empty() {
        return;
    }
    buf.put_u16(tlv::C1G2_READ_OP_SPEC_RESULT);
    buf.put_u16(read_op_result_len(data.len()) as u16);
    buf.put_u8(0);
    buf.put_u16(READ_OP_SPEC_ID);
    buf.put_u16(data.len().div_ceil(2) as u16);
    buf.put_slice(data);
}

/// Append one tag's TagReportData parameter.
pub fn put_tag_report_data(buf: &mut BytesMut, tag: &Tag) {
    buf.reserve(tag_report_data_len(tag));
    buf.put_u16(tlv::TAG_REPORT_DATA);
    buf.put_u16(tag_report_data_len(tag) as u16);
    put_epc(buf, tag.epc());
    put_peak_rssi(buf);
    put_c1g2_pc(buf, tag.pc_bits());
    put_read_op_result(buf, tag.read_data());
}

/// Encode one tag's TagReportData parameter.
///
/// ```rust
/// use llrp_emu::{Tag, llrp::tag_report_data};
///
/// let tag = Tag::new(0x3000, vec![0x30; 12]).unwrap();
/// let trd = tag_report_data(&tag);
/// assert_eq!(&trd[..4], &[0x00, 0xF0, 0x00, 22]);
/// ```
pub fn tag_report_data(tag: &Tag) -> Bytes {
    let mut buf = BytesMut::with_capacity(tag_report_data_len(tag));
    put_tag_report_data(&mut buf, tag);
    buf.freeze()
}

/// ReaderEventNotificationData with a UTCTimestamp and a successful
/// ConnectionAttemptEvent.
pub fn put_reader_event_notification_data(buf: &mut BytesMut, timestamp_micros: u64) {
    buf.put_u16(tlv::READER_EVENT_NOTIFICATION_DATA);
    buf.put_u16(4 + 12 + 6);
    buf.put_u16(tlv::UTC_TIMESTAMP);
    buf.put_u16(12);
    buf.put_u64(timestamp_micros);
    buf.put_u16(tlv::CONNECTION_ATTEMPT_EVENT);
    buf.put_u16(6);
    buf.put_u16(CONNECTION_SUCCESS);
}

pub fn put_keepalive_spec(buf: &mut BytesMut, interval_ms: u32) {
    buf.put_u16(tlv::KEEPALIVE_SPEC);
    buf.put_u16(9);
    buf.put_u8(KEEPALIVE_TRIGGER_PERIODIC);
    buf.put_u32(interval_ms);
}

/// LLRPStatus with status `M_Success` and no error description.
pub fn put_llrp_status_success(buf: &mut BytesMut) {
    buf.put_u16(tlv::LLRP_STATUS);
    buf.put_u16(8);
    buf.put_u16(0);
    buf.put_u16(0);
}
