//! Benchmarks for report frame construction
//!
//! Covers the work a connection does whenever the tag set changes:
//! - Encoding single TagReportData parameters (EPC-96 and EPCData forms)
//! - Packing whole inventories into PDU-bounded frames
//! - Decoding a report on the client path

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use llrp_emu::build_frames;
use llrp_emu::llrp::{MESSAGE_HEADER_LEN, decode_ro_access_report, tag_report_data};
use llrp_emu::test_utils::{legacy_fixture_tags, sequential_tags};
use std::hint::black_box;

fn bench_tag_report_data(c: &mut Criterion) {
    let tags = legacy_fixture_tags();

    let mut group = c.benchmark_group("tag_report_data");
    group.bench_function("epc_data_80_bit", |b| b.iter(|| black_box(tag_report_data(black_box(&tags[0])))));
    group.bench_function("epc_96", |b| b.iter(|| black_box(tag_report_data(black_box(&tags[1])))));
    group.finish();
}

fn bench_build_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_frames");

    for count in [100usize, 1_000, 10_000] {
        let tags = sequential_tags(count);
        group.throughput(Throughput::Elements(count as u64));
        for pdu in [1500usize, 0] {
            group.bench_with_input(BenchmarkId::new(format!("pdu_{pdu}"), count), &tags, |b, tags| {
                b.iter(|| black_box(build_frames(black_box(tags), pdu)))
            });
        }
    }

    group.finish();
}

fn bench_decode_report(c: &mut Criterion) {
    let frames = build_frames(&sequential_tags(1_000), 1500);
    let frame = &frames[0];
    let declared = (MESSAGE_HEADER_LEN + frame.payload.len()) as u32;

    let mut group = c.benchmark_group("decode_ro_access_report");
    group.throughput(Throughput::Bytes(frame.payload.len() as u64));
    group.bench_function("full_pdu", |b| {
        b.iter(|| black_box(decode_ro_access_report(declared, black_box(&frame.payload)).expect("decodes")))
    });
    group.finish();
}

criterion_group!(benches, bench_tag_report_data, bench_build_frames, bench_decode_report);
criterion_main!(benches);
