//! Virtual tag model
//!
//! A [`Tag`] is one simulated RFID tag: the C1G2 Protocol-Control word, the EPC
//! and, for tags loaded from legacy CSV rows, the data returned by a read
//! operation. [`TagRecord`] is the string form used by the management channel
//! and by persisted files.
//!
//! ## Identity
//!
//! - Two tags are *duplicates* when their EPCs are equal. The registry
//!   de-duplicates on this.
//! - Two tags are *equal* (`==`) when both PC word and EPC match.
//!
//! ```rust
//! use llrp_emu::{Tag, TagRecord};
//!
//! let record = TagRecord::new("3000", "302db319a0000040000002b8");
//! let tag = Tag::from_record(&record).unwrap();
//! assert_eq!(tag.pc_bits(), 0x3000);
//! assert_eq!(tag.epc().len(), 12);
//! assert_eq!(tag.to_record(), record);
//! ```

pub mod bits;
pub mod store;

use crate::{EmulatorError, Result};
use serde::{Deserialize, Serialize};

pub use bits::{decode_hex, encode_hex, parse_bit_string, to_bit_string};

/// Longest EPC a C1G2 PC word can describe (31 words).
pub const MAX_EPC_LEN: usize = 62;

/// Upper bound on read-op result data carried by a single tag.
pub const MAX_READ_DATA_LEN: usize = 1024;

/// A single virtual tag.
#[derive(Debug, Clone, Eq)]
pub struct Tag {
    pc_bits: u16,
    epc: Vec<u8>,
    read_data: Vec<u8>,
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.pc_bits == other.pc_bits && self.epc == other.epc
    }
}

impl Tag {
    /// Create a tag from a PC word and EPC bytes.
    pub fn new(pc_bits: u16, epc: impl Into<Vec<u8>>) -> Result<Self> {
        let epc = epc.into();
        if epc.is_empty() || epc.len() > MAX_EPC_LEN {
            return Err(EmulatorError::invalid_epc(
                encode_hex(&epc),
                format!("EPC must be 1..={MAX_EPC_LEN} bytes, got {}", epc.len()),
            ));
        }
        Ok(Self { pc_bits, epc, read_data: Vec::new() })
    }

    /// Attach read-op result data, reported as a C1G2ReadOpSpecResult.
    pub fn with_read_data(mut self, read_data: impl Into<Vec<u8>>) -> Result<Self> {
        let read_data = read_data.into();
        if read_data.len() > MAX_READ_DATA_LEN {
            return Err(EmulatorError::parse(
                "tag read data",
                format!("{} bytes exceeds {MAX_READ_DATA_LEN}", read_data.len()),
            ));
        }
        self.read_data = read_data;
        Ok(self)
    }

    /// Build a tag from a hex PC word and an EPC given as a bit string.
    pub fn from_bit_string(pc_hex: &str, epc_bits: &str) -> Result<Self> {
        let pc_bits = parse_pc_hex(pc_hex)?;
        let epc = parse_bit_string(epc_bits)?;
        Self::new(pc_bits, epc)
    }

    /// Build a tag from its hex record form.
    pub fn from_record(record: &TagRecord) -> Result<Self> {
        let pc_bits = parse_pc_hex(&record.pc_bits)?;
        let epc = decode_hex(record.epc.trim())?;
        Self::new(pc_bits, epc)
    }

    /// Hex record form: unpadded lowercase PC word, EPC as lowercase hex.
    pub fn to_record(&self) -> TagRecord {
        TagRecord { pc_bits: format!("{:x}", self.pc_bits), epc: encode_hex(&self.epc) }
    }

    pub fn pc_bits(&self) -> u16 {
        self.pc_bits
    }

    pub fn epc(&self) -> &[u8] {
        &self.epc
    }

    pub fn read_data(&self) -> &[u8] {
        &self.read_data
    }

    /// EPC length in bits as written into EPCData.
    pub fn epc_len_bits(&self) -> u16 {
        (self.epc.len() * 8) as u16
    }

    /// True when `other` carries the same EPC, whatever its PC word.
    pub fn is_duplicate(&self, other: &Tag) -> bool {
        self.epc == other.epc
    }
}

/// Position of the first tag in `tags` that duplicates `tag`.
pub fn index_of(tags: &[Tag], tag: &Tag) -> Option<usize> {
    tags.iter().position(|t| t.is_duplicate(tag))
}

fn parse_pc_hex(value: &str) -> Result<u16> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EmulatorError::InvalidPcBits { value: value.to_string() });
    }
    u16::from_str_radix(trimmed, 16)
        .map_err(|_| EmulatorError::InvalidPcBits { value: value.to_string() })
}

/// String form of a tag as exchanged with management clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    #[serde(rename = "PCBits")]
    pub pc_bits: String,
    #[serde(rename = "EPC")]
    pub epc: String,
}

impl TagRecord {
    pub fn new(pc_bits: impl Into<String>, epc: impl Into<String>) -> Self {
        Self { pc_bits: pc_bits.into(), epc: epc.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    prop_compose! {
        fn arb_tag()(
            pc_bits in any::<u16>(),
            epc in prop::collection::vec(any::<u8>(), 1..=MAX_EPC_LEN),
        ) -> Tag {
            Tag::new(pc_bits, epc).unwrap()
        }
    }

    #[test]
    fn from_record_parses_hex_fields() {
        let tag = Tag::from_record(&TagRecord::new("29a9", "dc20420c4c72cf4d76de")).unwrap();
        assert_eq!(tag.pc_bits(), 10665);
        assert_eq!(tag.epc(), &[220, 32, 66, 12, 76, 114, 207, 77, 118, 222]);
        assert_eq!(tag.epc_len_bits(), 80);
    }

    #[test]
    fn from_record_reports_which_field_failed() {
        let err = Tag::from_record(&TagRecord::new("xyz", "3000")).unwrap_err();
        assert!(matches!(err, EmulatorError::InvalidPcBits { .. }));

        // 0x12345 does not fit in 16 bits
        let err = Tag::from_record(&TagRecord::new("12345", "3000")).unwrap_err();
        assert!(matches!(err, EmulatorError::InvalidPcBits { .. }));

        let err = Tag::from_record(&TagRecord::new("3000", "30g0")).unwrap_err();
        assert!(matches!(err, EmulatorError::InvalidEpc { .. }));
    }

    #[test]
    fn from_bit_string_requires_byte_alignment() {
        let tag = Tag::from_bit_string("3000", "0011000000101101").unwrap();
        assert_eq!(tag.epc(), &[0x30, 0x2D]);

        let err = Tag::from_bit_string("3000", "001100000010110").unwrap_err();
        assert!(matches!(err, EmulatorError::NonByteAlignedBinaryString { length: 15 }));
    }

    #[test]
    fn rejects_oversized_epc() {
        assert!(Tag::new(0x3000, vec![0u8; MAX_EPC_LEN + 1]).is_err());
        assert!(Tag::new(0x3000, Vec::new()).is_err());
    }

    #[test]
    fn equality_ignores_read_data_but_not_pc() {
        let a = Tag::new(0x3000, vec![1, 2]).unwrap();
        let b = Tag::new(0x3000, vec![1, 2]).unwrap().with_read_data(vec![0xA8, 0x96]).unwrap();
        let c = Tag::new(0x3400, vec![1, 2]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.is_duplicate(&c));
    }

    #[test]
    fn index_of_matches_by_epc() {
        let tags = vec![
            Tag::new(0x3000, vec![1]).unwrap(),
            Tag::new(0x3000, vec![2]).unwrap(),
        ];
        assert_eq!(index_of(&tags, &Tag::new(0x1111, vec![2]).unwrap()), Some(1));
        assert_eq!(index_of(&tags, &Tag::new(0x3000, vec![3]).unwrap()), None);
    }

    #[test]
    fn short_pc_words_keep_their_record_form() {
        for record in [TagRecord::new("800", "0102"), TagRecord::new("0", "ff"), TagRecord::new("3000", "0102")] {
            let tag = Tag::from_record(&record).unwrap();
            assert_eq!(tag.to_record(), record);
        }
        assert_eq!(Tag::new(0x0800, vec![1, 2]).unwrap().to_record().pc_bits, "800");
    }

    #[test]
    fn record_serializes_with_wire_field_names() {
        let json = serde_json::to_string(&TagRecord::new("3000", "0102")).unwrap();
        assert_eq!(json, r#"{"PCBits":"3000","EPC":"0102"}"#);
    }

    proptest! {
        #[test]
        fn record_round_trip(tag in arb_tag()) {
            let record = tag.to_record();
            let back = Tag::from_record(&record).unwrap();
            prop_assert_eq!(&back, &tag);
            prop_assert_eq!(back.to_record(), record);
        }

        #[test]
        fn record_round_trip_ignores_hex_case(pc in any::<u16>(), epc in prop::collection::vec(any::<u8>(), 1..32)) {
            let upper = TagRecord::new(format!("{pc:X}"), encode_hex(&epc).to_uppercase());
            let tag = Tag::from_record(&upper).unwrap();
            let record = tag.to_record();
            prop_assert_eq!(record.pc_bits, upper.pc_bits.to_lowercase());
            prop_assert_eq!(record.epc, upper.epc.to_lowercase());
        }

        #[test]
        fn duplicate_detection(a in arb_tag(), b in arb_tag()) {
            prop_assert!(a.is_duplicate(&a));
            prop_assert_eq!(a.is_duplicate(&b), a.epc() == b.epc());
        }
    }
}
