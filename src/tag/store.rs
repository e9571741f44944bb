//! Tag-set persistence: CSV rows and a compact binary form
//!
//! ## CSV
//!
//! Two row shapes are accepted:
//!
//! - `pcHex,epcBitString` - the current form
//! - `pc,length,epcLengthBits,epcHex,readDataHex` - legacy rows that also carry
//!   read-op data. The PC column of legacy files was written in hex by some
//!   tools and in decimal by others; the reading whose EPC-length field
//!   (`pc >> 11`, in 16-bit words) agrees with the EPC wins.
//!
//! Rows that fail to parse are skipped with a warning; the rest still load.
//!
//! ## Binary
//!
//! Big-endian, length prefixed:
//!
//! ```text
//! u32 count
//! count x { u16 pc, u16 epc_len, epc, u16 read_len, read_data }
//! ```
//!
//! Used for fast reloads and for simulation event-cycle files. A CSV file
//! loaded through [`load_tags_cached`] gets a `.bin` sibling that later starts
//! read instead, until the CSV is modified again.

use super::{Tag, decode_hex, encode_hex, to_bit_string};
use crate::{EmulatorError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::path::Path;
use tracing::{debug, info, warn};

/// Load tags from `path`, choosing CSV for `.csv` files and binary otherwise.
pub fn load_tags(path: impl AsRef<Path>) -> Result<Vec<Tag>> {
    let path = path.as_ref();
    let is_csv = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    let tags = if is_csv { load_csv(path)? } else { load_binary(path)? };
    info!(file = %path.display(), count = tags.len(), "tags loaded");
    Ok(tags)
}

/// Save tags to `path` in the format implied by its extension.
pub fn save_tags(path: impl AsRef<Path>, tags: &[Tag]) -> Result<()> {
    let path = path.as_ref();
    if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")) {
        save_csv(path, tags)
    } else {
        save_binary(path, tags)
    }
}

/// Load tags like [`load_tags`], keeping a binary cache next to CSV files.
///
/// The cache (`tags.csv` -> `tags.bin`) is used when it is at least as new as
/// the CSV. A missing, stale or unreadable cache is rebuilt from the CSV. A
/// failed cache write is logged and otherwise ignored.
pub fn load_tags_cached(path: impl AsRef<Path>) -> Result<Vec<Tag>> {
    let path = path.as_ref();
    if !path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")) {
        return load_tags(path);
    }

    let cache = path.with_extension("bin");
    if cache_is_fresh(path, &cache) {
        match load_binary(&cache) {
            Ok(tags) => {
                info!(file = %cache.display(), count = tags.len(), "tags loaded from cache");
                return Ok(tags);
            }
            Err(e) => warn!(file = %cache.display(), "Ignoring unreadable tag cache: {}", e),
        }
    }

    let tags = load_tags(path)?;
    match save_binary(&cache, &tags) {
        Ok(()) => debug!(file = %cache.display(), "tag cache written"),
        Err(e) => warn!("Cannot write tag cache: {}", e),
    }
    Ok(tags)
}

fn cache_is_fresh(source: &Path, cache: &Path) -> bool {
    let modified = |p: &Path| std::fs::metadata(p).and_then(|m| m.modified()).ok();
    match (modified(source), modified(cache)) {
        (Some(source), Some(cache)) => cache >= source,
        _ => false,
    }
}

pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Tag>> {
    let path = path.as_ref();
    let text =
        std::fs::read_to_string(path).map_err(|e| EmulatorError::file_error(path, e))?;
    Ok(parse_csv(&text))
}

/// Parse CSV text, skipping rows that do not decode.
pub fn parse_csv(text: &str) -> Vec<Tag> {
    let mut tags = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        match parse_csv_row(line_no, line) {
            Ok(tag) => tags.push(tag),
            Err(e) => warn!(line = line_no, "skipping tag row: {}", e),
        }
    }
    debug!("parsed {} tags from CSV", tags.len());
    tags
}

/// Parse a single CSV row.
pub fn parse_csv_row(line_no: usize, line: &str) -> Result<Tag> {
    let fields: Vec<&str> =
        line.split(',').map(|f| f.trim().trim_matches('"').trim()).collect();

    match fields.as_slice() {
        [pc, epc_bits] => Tag::from_bit_string(pc, epc_bits),
        [pc, _length, epc_len_bits, epc_hex, read_hex] => {
            let epc = decode_hex(epc_hex)?;
            let declared_bits: usize = epc_len_bits.parse().map_err(|_| {
                EmulatorError::InvalidRecord {
                    line: line_no,
                    reason: format!("EPC length '{epc_len_bits}' is not a number"),
                }
            })?;
            if declared_bits != epc.len() * 8 {
                return Err(EmulatorError::InvalidRecord {
                    line: line_no,
                    reason: format!(
                        "EPC length {declared_bits} bits does not match {} hex bytes",
                        epc.len()
                    ),
                });
            }
            let pc_bits = parse_legacy_pc(pc, epc.len())?;
            let tag = Tag::new(pc_bits, epc)?;
            if read_hex.is_empty() { Ok(tag) } else { tag.with_read_data(decode_hex(read_hex)?) }
        }
        other => Err(EmulatorError::InvalidRecord {
            line: line_no,
            reason: format!("expected 2 or 5 fields, found {}", other.len()),
        }),
    }
}

fn parse_legacy_pc(field: &str, epc_len: usize) -> Result<u16> {
    let hex = u16::from_str_radix(field, 16).ok();
    let decimal = field.parse::<u16>().ok();
    let consistent = |pc: u16| usize::from(pc >> 11) * 2 == epc_len;

    match (hex, decimal) {
        (Some(pc), _) if consistent(pc) => Ok(pc),
        (_, Some(pc)) if consistent(pc) => Ok(pc),
        (Some(pc), _) | (None, Some(pc)) => Ok(pc),
        (None, None) => Err(EmulatorError::InvalidPcBits { value: field.to_string() }),
    }
}

/// Render tags as CSV. Tags with read data use the legacy five-field row so
/// nothing is lost.
pub fn to_csv(tags: &[Tag]) -> String {
    let mut out = String::new();
    for tag in tags {
        if tag.read_data().is_empty() {
            out.push_str(&format!("{:04x},{}\n", tag.pc_bits(), to_bit_string(tag.epc())));
        } else {
            out.push_str(&format!(
                "{:04x},{},{},{},{}\n",
                tag.pc_bits(),
                6 + tag.epc().len(),
                tag.epc_len_bits(),
                encode_hex(tag.epc()),
                encode_hex(tag.read_data()),
            ));
        }
    }
    out
}

pub fn save_csv(path: impl AsRef<Path>, tags: &[Tag]) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, to_csv(tags)).map_err(|e| EmulatorError::file_error(path, e))
}

/// Encode tags in the binary tag-set form.
pub fn encode_binary(tags: &[Tag]) -> Bytes {
    let size: usize = 4 + tags.iter().map(|t| 6 + t.epc().len() + t.read_data().len()).sum::<usize>();
    let mut buf = BytesMut::with_capacity(size);
    buf.put_u32(tags.len() as u32);
    for tag in tags {
        buf.put_u16(tag.pc_bits());
        buf.put_u16(tag.epc().len() as u16);
        buf.put_slice(tag.epc());
        buf.put_u16(tag.read_data().len() as u16);
        buf.put_slice(tag.read_data());
    }
    buf.freeze()
}

/// Decode the binary tag-set form. Trailing bytes are an error.
pub fn decode_binary(mut data: &[u8]) -> Result<Vec<Tag>> {
    let count = take_u32(&mut data, "tag count")? as usize;
    // Each tag needs at least six bytes, so a huge count in a short file is caught here
    if count > data.len() / 6 {
        return Err(EmulatorError::parse(
            "binary tag set",
            format!("{count} tags declared but only {} bytes follow", data.len()),
        ));
    }

    let mut tags = Vec::with_capacity(count);
    for i in 0..count {
        let pc_bits = take_u16(&mut data, "PC bits")?;
        let epc_len = take_u16(&mut data, "EPC length")? as usize;
        let epc = take_bytes(&mut data, epc_len, "EPC")?;
        let read_len = take_u16(&mut data, "read data length")? as usize;
        let read_data = take_bytes(&mut data, read_len, "read data")?;

        let tag = Tag::new(pc_bits, epc)
            .and_then(|tag| tag.with_read_data(read_data))
            .map_err(|e| EmulatorError::parse("binary tag set", format!("tag {i}: {e}")))?;
        tags.push(tag);
    }

    if data.has_remaining() {
        return Err(EmulatorError::parse(
            "binary tag set",
            format!("{} trailing bytes after {count} tags", data.remaining()),
        ));
    }
    Ok(tags)
}

pub fn load_binary(path: impl AsRef<Path>) -> Result<Vec<Tag>> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| EmulatorError::file_error(path, e))?;
    decode_binary(&data)
}

pub fn save_binary(path: impl AsRef<Path>, tags: &[Tag]) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, encode_binary(tags)).map_err(|e| EmulatorError::file_error(path, e))
}

fn take_u16(data: &mut &[u8], what: &str) -> Result<u16> {
    if data.remaining() < 2 {
        return Err(EmulatorError::parse("binary tag set", format!("truncated {what}")));
    }
    Ok(data.get_u16())
}

fn take_u32(data: &mut &[u8], what: &str) -> Result<u32> {
    if data.remaining() < 4 {
        return Err(EmulatorError::parse("binary tag set", format!("truncated {what}")));
    }
    Ok(data.get_u32())
}

fn take_bytes(data: &mut &[u8], len: usize, what: &str) -> Result<Vec<u8>> {
    if data.remaining() < len {
        return Err(EmulatorError::parse(
            "binary tag set",
            format!("{what} needs {len} bytes, {} left", data.remaining()),
        ));
    }
    let bytes = data[..len].to_vec();
    data.advance(len);
    Ok(bytes)
}
