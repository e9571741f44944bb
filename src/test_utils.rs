//! Shared fixtures for unit tests and benchmarks
//!
//! The three legacy tags below are the reference data the wire encoders are
//! checked against: an 80-bit EPC (EPCData form), a 96-bit EPC (EPC-96 form)
//! and a 128-bit EPC, each carrying the read result `a896`.

#![cfg(any(test, feature = "benchmark"))]

use crate::tag::{Tag, decode_hex, store};
use std::path::{Path, PathBuf};

/// Legacy five-field CSV rows for the reference tags.
pub const LEGACY_CSV: &str = "\
10665,16,80,dc20420c4c72cf4d76de,a896
12288,18,96,302DB319A0000040000002B8,a896
16802,22,128,c4a301c70d36cb32920b1d31c2dc3482,a896
";

/// The reference tags, built directly rather than through the CSV loader.
pub fn legacy_fixture_tags() -> Vec<Tag> {
    [
        (0x29A9, "dc20420c4c72cf4d76de"),
        (0x3000, "302DB319A0000040000002B8"),
        (0x41A2, "c4a301c70d36cb32920b1d31c2dc3482"),
    ]
    .into_iter()
    .map(|(pc, epc)| {
        Tag::new(pc, decode_hex(epc).expect("fixture EPC is valid hex"))
            .and_then(|tag| tag.with_read_data(vec![0xA8, 0x96]))
            .expect("fixture tag is valid")
    })
    .collect()
}

/// `count` distinct tags with 96-bit EPCs, sized like a typical inventory.
pub fn sequential_tags(count: usize) -> Vec<Tag> {
    (0..count)
        .map(|i| {
            let mut epc = vec![0x30, 0x2D, 0xB3, 0x19];
            epc.extend_from_slice(&(i as u64).to_be_bytes());
            Tag::new(0x3000, epc).expect("12 byte EPC is valid")
        })
        .collect()
}

/// Write each tag set as a numbered binary event-cycle file in `dir`.
///
/// Files are named `cycle-000.bin`, `cycle-001.bin`, ... so name order is
/// replay order.
pub fn write_event_cycles(dir: &Path, cycles: &[Vec<Tag>]) -> Vec<PathBuf> {
    cycles
        .iter()
        .enumerate()
        .map(|(i, tags)| {
            let path = dir.join(format!("cycle-{i:03}.bin"));
            store::save_binary(&path, tags).expect("event cycle file is writable");
            path
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_fixture_matches_constructed_tags() {
        let parsed = store::parse_csv(LEGACY_CSV);
        assert_eq!(parsed, legacy_fixture_tags());
    }

    #[test]
    fn sequential_tags_are_distinct() {
        let tags = sequential_tags(50);
        for (i, tag) in tags.iter().enumerate() {
            assert_eq!(crate::tag::index_of(&tags, tag), Some(i));
        }
    }

    #[test]
    fn event_cycles_are_written_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_event_cycles(dir.path(), &[sequential_tags(1), sequential_tags(2)]);
        assert_eq!(paths.len(), 2);
        assert!(paths[0] < paths[1]);
        assert_eq!(store::load_binary(&paths[1]).unwrap().len(), 2);
    }
}
