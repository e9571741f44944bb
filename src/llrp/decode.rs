//! RO_ACCESS_REPORT decoding for the client path
//!
//! The decoder walks the TagReportData stack using each parameter's own
//! length and walks the sub-parameters of every TRD. Every read is checked
//! against both the enclosing parameter and the declared report length, so a
//! malformed report yields a [`EmulatorError::Parse`] instead of reading past
//! the boundary. A TRD that ends exactly at the report end is fine.

use super::header::MESSAGE_HEADER_LEN;
use super::param::{tlv, tv};
use crate::{EmulatorError, Result};

const CONTEXT: &str = "RO_ACCESS_REPORT";

/// One tag read recovered from a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagReadEvent {
    pub epc: Vec<u8>,
    pub pc_bits: Option<u16>,
}

/// Decode every TagReportData in a report body, in wire order.
///
/// `declared_len` is the message length from the header (header included).
pub fn decode_ro_access_report(declared_len: u32, body: &[u8]) -> Result<Vec<TagReadEvent>> {
    let declared_body = (declared_len as usize).checked_sub(MESSAGE_HEADER_LEN).ok_or_else(|| {
        EmulatorError::parse(CONTEXT, format!("declared length {declared_len} is shorter than a header"))
    })?;
    if declared_body > body.len() {
        return Err(EmulatorError::parse(
            CONTEXT,
            format!("declared body of {declared_body} bytes but only {} present", body.len()),
        ));
    }
    let body = &body[..declared_body];

    let mut events = Vec::new();
    let mut offset = 0;
    while offset < body.len() {
        let (kind, len) = tlv_header(body, offset)?;
        let param = &body[offset..offset + len];
        if kind == tlv::TAG_REPORT_DATA {
            events.push(decode_tag_report_data(&param[4..])?);
        }
        offset += len;
    }
    Ok(events)
}

/// Read a TLV header at `offset` and check the parameter fits in `data`.
fn tlv_header(data: &[u8], offset: usize) -> Result<(u16, usize)> {
    let head = data.get(offset..offset + 4).ok_or_else(|| {
        EmulatorError::parse(CONTEXT, format!("truncated parameter header at offset {offset}"))
    })?;
    if head[0] & 0x80 != 0 {
        return Err(EmulatorError::parse(
            CONTEXT,
            format!("unexpected TV parameter {} at offset {offset}", head[0] & 0x7F),
        ));
    }
    let kind = parse_u16_be(&head[0..2]) & 0x03FF;
    let len = parse_u16_be(&head[2..4]) as usize;
    if len < 4 || offset + len > data.len() {
        return Err(EmulatorError::parse(
            CONTEXT,
            format!("parameter {kind} of length {len} at offset {offset} overruns {}", data.len()),
        ));
    }
    Ok((kind, len))
}

fn decode_tag_report_data(trd: &[u8]) -> Result<TagReadEvent> {
    let mut epc = None;
    let mut pc_bits = None;
    let mut offset = 0;

    while offset < trd.len() {
        let marker = trd[offset];
        if marker & 0x80 != 0 {
            let size = tv_size(marker & 0x7F).ok_or_else(|| {
                EmulatorError::parse(CONTEXT, format!("unknown TV parameter {}", marker & 0x7F))
            })?;
            let param = trd.get(offset..offset + size).ok_or_else(|| {
                EmulatorError::parse(CONTEXT, format!("TV parameter {} runs past TRD end", marker & 0x7F))
            })?;
            match marker {
                tv::EPC_96 => epc = Some(param[1..].to_vec()),
                tv::C1G2_PC => pc_bits = Some(parse_u16_be(&param[1..3])),
                _ => {}
            }
            offset += size;
        } else {
            let (kind, len) = tlv_header(trd, offset)?;
            if kind == tlv::EPC_DATA {
                epc = Some(decode_epc_data(&trd[offset..offset + len])?);
            }
            offset += len;
        }
    }

    let epc = epc.ok_or_else(|| EmulatorError::parse(CONTEXT, "TagReportData without an EPC"))?;
    Ok(TagReadEvent { epc, pc_bits })
}

fn decode_epc_data(param: &[u8]) -> Result<Vec<u8>> {
    let bits = param
        .get(4..6)
        .map(parse_u16_be)
        .ok_or_else(|| EmulatorError::parse(CONTEXT, "EPCData without a bit length"))?;
    let bytes = (bits as usize).div_ceil(8);
    param
        .get(6..6 + bytes)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| EmulatorError::parse(CONTEXT, format!("EPCData of {bits} bits runs past parameter end")))
}

/// Total size (marker included) of a TV parameter.
fn tv_size(kind: u8) -> Option<usize> {
    match kind {
        1 => Some(3),          // AntennaID
        2..=5 => Some(9),      // First/LastSeenTimestamp UTC/Uptime
        6 => Some(2),          // PeakRSSI
        7 | 8 => Some(3),      // ChannelIndex, TagSeenCount
        9 => Some(5),          // ROSpecID
        10 | 11 => Some(3),    // InventoryParameterSpecID, C1G2CRC
        12 => Some(3),         // C1G2PC
        13 => Some(13),        // EPC-96
        14 | 15 => Some(3),    // SpecIndex, ClientRequestOpSpecResult
        16 => Some(5),         // AccessSpecID
        17 | 18 => Some(3),    // OpSpecID, C1G2SingulationDetails
        _ => None,
    }
}

pub(crate) fn parse_u16_be(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}

pub(crate) fn parse_u32_be(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
