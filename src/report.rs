//! Report aggregation: packing tags into size-bounded RO_ACCESS_REPORT payloads

use crate::llrp::MESSAGE_HEADER_LEN;
use crate::llrp::param::{put_tag_report_data, tag_report_data_len};
use crate::tag::Tag;
use bytes::{Bytes, BytesMut};
use std::ops::Deref;
use std::sync::Arc;

/// Slack reserved for the next TRD's own parameter header.
const TRD_HEADER_SLACK: usize = 4;

/// A run of encoded TagReportData parameters sent as one RO_ACCESS_REPORT body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub payload: Bytes,
    pub tag_count: usize,
}

/// Immutable, shareable list of frames built from one tag snapshot.
#[derive(Debug, Clone, Default)]
pub struct FrameSequence(Arc<[Frame]>);

impl FrameSequence {
    pub fn total_tag_count(&self) -> usize {
        self.0.iter().map(|frame| frame.tag_count).sum()
    }
}

impl Deref for FrameSequence {
    type Target = [Frame];

    fn deref(&self) -> &[Frame] {
        &self.0
    }
}

impl From<Vec<Frame>> for FrameSequence {
    fn from(frames: Vec<Frame>) -> Self {
        Self(frames.into())
    }
}

/// Pack `tags` into frames, preserving order.
///
/// A frame is closed once adding the next TRD would bring the message
/// (header, current payload, TRD header slack and the TRD) to `max_pdu` or
/// beyond. A tag whose own encoding is already too large still gets a frame
/// of its own. A `max_pdu` of 0 or `usize::MAX` disables the cap.
pub fn build_frames(tags: &[Tag], max_pdu: usize) -> FrameSequence {
    let capped = max_pdu != 0 && max_pdu != usize::MAX;
    let mut frames = Vec::new();
    let mut current = BytesMut::new();
    let mut count = 0;

    for tag in tags {
        let size = tag_report_data_len(tag);
        if count > 0 && capped && MESSAGE_HEADER_LEN + current.len() + TRD_HEADER_SLACK + size >= max_pdu {
            frames.push(Frame { payload: current.split().freeze(), tag_count: count });
            count = 0;
        }
        put_tag_report_data(&mut current, tag);
        count += 1;
    }
    if count > 0 {
        frames.push(Frame { payload: current.freeze(), tag_count: count });
    }

    frames.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llrp::decode_ro_access_report;
    use crate::test_utils::legacy_fixture_tags;
    use proptest::prelude::*;

    fn arb_tags() -> impl Strategy<Value = Vec<Tag>> {
        prop::collection::vec(
            (any::<u16>(), prop::collection::vec(any::<u8>(), 1..=20), prop::collection::vec(any::<u8>(), 0..4)),
            0..60,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .map(|(pc, epc, rd)| Tag::new(pc, epc).unwrap().with_read_data(rd).unwrap())
                .collect()
        })
    }

    fn decoded_epcs(frames: &FrameSequence) -> Vec<Vec<u8>> {
        frames
            .iter()
            .flat_map(|frame| {
                let len = (MESSAGE_HEADER_LEN + frame.payload.len()) as u32;
                decode_ro_access_report(len, &frame.payload).unwrap()
            })
            .map(|event| event.epc)
            .collect()
    }

    #[test]
    fn small_pdu_splits_fixture() {
        let tags = legacy_fixture_tags();
        let frames = build_frames(&tags, 40);
        assert!(frames.len() > 1);
        assert_eq!(frames.total_tag_count(), 3);
        // Each fixture TRD is 33..=42 bytes, so every tag sits alone
        assert!(frames.iter().all(|frame| frame.tag_count == 1));
    }

    #[test]
    fn pdu_splits_when_tags_individually_fit() {
        let tags: Vec<Tag> = (0u8..3).map(|i| Tag::new(0x0800, vec![i]).unwrap()).collect();
        // Each TRD is 4 + 7 + 2 + 3 = 16 bytes
        let frames = build_frames(&tags, 40);
        assert!(frames.len() > 1);
        for frame in frames.iter() {
            assert!(MESSAGE_HEADER_LEN + frame.payload.len() < 40);
        }
        assert_eq!(frames.total_tag_count(), 3);
    }

    #[test]
    fn uncapped_collapses_into_one_frame() {
        let tags = legacy_fixture_tags();
        for pdu in [0, usize::MAX] {
            let frames = build_frames(&tags, pdu);
            assert_eq!(frames.len(), 1);
            assert_eq!(frames[0].tag_count, 3);
            assert_eq!(frames[0].payload.len(), 36 + 33 + 42);
        }
    }

    #[test]
    fn no_tags_no_frames() {
        assert!(build_frames(&[], 1500).is_empty());
        assert_eq!(build_frames(&[], 1500).total_tag_count(), 0);
    }

    #[test]
    fn oversized_tag_gets_its_own_frame() {
        let big = Tag::new(0x3000, vec![0xEE; 62]).unwrap().with_read_data(vec![1; 64]).unwrap();
        let small = Tag::new(0x0800, vec![1, 2]).unwrap();
        let tags = vec![small.clone(), big.clone(), small];
        let frames = build_frames(&tags, 50);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].tag_count, 1);
        assert_eq!(frames[1].payload, crate::llrp::tag_report_data(&big));
        assert!(MESSAGE_HEADER_LEN + frames[1].payload.len() > 50);
    }

    proptest! {
        #[test]
        fn frames_respect_pdu(tags in arb_tags(), pdu in 1usize..400) {
            let frames = build_frames(&tags, pdu);
            for frame in frames.iter() {
                if frame.tag_count > 1 {
                    prop_assert!(MESSAGE_HEADER_LEN + frame.payload.len() < pdu);
                } else {
                    prop_assert_eq!(frame.tag_count, 1);
                }
            }
        }

        #[test]
        fn frames_are_complete_and_ordered(tags in arb_tags(), pdu in 0usize..400) {
            let frames = build_frames(&tags, pdu);
            prop_assert_eq!(frames.total_tag_count(), tags.len());
            let expected: Vec<Vec<u8>> = tags.iter().map(|t| t.epc().to_vec()).collect();
            prop_assert_eq!(decoded_epcs(&frames), expected);
        }

        #[test]
        fn frame_payload_is_concatenated_trds(tags in arb_tags()) {
            let frames = build_frames(&tags, 0);
            let expected: Vec<u8> = tags.iter().flat_map(|t| crate::llrp::tag_report_data(t).to_vec()).collect();
            let actual: Vec<u8> = frames.iter().flat_map(|f| f.payload.to_vec()).collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
