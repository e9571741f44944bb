//! Bit-string and hex conversions for tag identifiers

use crate::{EmulatorError, Result};
use std::fmt::Write;

/// Parse a string of `'0'`/`'1'` characters into bytes, most significant bit first.
///
/// The length must be a non-zero multiple of eight; nothing is padded or
/// truncated.
pub fn parse_bit_string(bits: &str) -> Result<Vec<u8>> {
    let length = bits.len();
    if length % 8 != 0 {
        return Err(EmulatorError::NonByteAlignedBinaryString { length });
    }
    if length < 8 {
        return Err(EmulatorError::BinaryStringTooShort { length });
    }

    bits.as_bytes()
        .chunks_exact(8)
        .map(|chunk| {
            chunk.iter().try_fold(0u8, |acc, &c| match c {
                b'0' => Ok(acc << 1),
                b'1' => Ok((acc << 1) | 1),
                _ => Err(EmulatorError::invalid_epc(bits, "binary string contains a non 0/1 digit")),
            })
        })
        .collect()
}

/// Render bytes as a bit string, eight characters per byte.
pub fn to_bit_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 8);
    for byte in bytes {
        let _ = write!(out, "{byte:08b}");
    }
    out
}

/// Decode a hex string (either case) into bytes.
pub fn decode_hex(value: &str) -> Result<Vec<u8>> {
    if value.is_empty() {
        return Err(EmulatorError::invalid_epc(value, "empty hex string"));
    }
    hex::decode(value).map_err(|e| EmulatorError::invalid_epc(value, e.to_string()))
}

/// Lowercase hex rendering.
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}
