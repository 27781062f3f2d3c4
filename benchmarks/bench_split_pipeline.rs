use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use chatsplit::parsers::boundary::{split_before_group, split_complete, group_open_marker};
use chatsplit::parsers::MessageExtractor;
use chatsplit::timestamp::YearClassifier;

fn sample_fragment(groups: usize) -> String {
    let mut out = String::with_capacity(groups * 320);
    for i in 0..groups {
        out.push_str(&format!(
            "<div class=\"chatlog__message-group\"><div class=\"chatlog__messages\">\
             <span class=\"chatlog__timestamp\" title=\"Monday, 3 May 2021 12:00\">{:02}-May-21 12:00</span>\
             <div class=\"chatlog__content\"><div class=\"markdown\">message body {}</div></div></div></div>\n",
            i % 28 + 1,
            i
        ));
    }
    out
}

fn bench_split_complete(c: &mut Criterion) {
    let mut buf = sample_fragment(2_000).into_bytes();
    buf.extend_from_slice(b"<div class=\"chatlog__message-group\"><div class=\"chatlog__mess");

    let mut group = c.benchmark_group("boundary");
    group.throughput(Throughput::Bytes(buf.len() as u64));
    group.bench_function("last_closing_tag", |b| {
        b.iter(|| black_box(split_complete(black_box(&buf))));
    });
    let marker = group_open_marker("chatlog__message-group");
    group.bench_function("group_start", |b| {
        b.iter(|| black_box(split_before_group(black_box(&buf), marker.as_bytes())));
    });
    group.finish();
}

fn bench_classify(c: &mut Criterion) {
    let classifier = YearClassifier::new().unwrap();
    let inputs = [
        "15-Jan-21 10:04",
        "02/03/2021 10:04",
        "15 March 2022 10:04",
        "March 15, 2022 10:04",
        "Today at 10:04",
    ];

    c.bench_function("classify_mixed", |b| {
        b.iter(|| {
            for input in &inputs {
                black_box(classifier.classify(black_box(input)));
            }
        });
    });
}

fn bench_extract(c: &mut Criterion) {
    let fragment = sample_fragment(500);
    let extractor = MessageExtractor::default();

    let mut group = c.benchmark_group("extract");
    group.throughput(Throughput::Bytes(fragment.len() as u64));
    group.sample_size(20);
    group.bench_function("500_groups", |b| {
        b.iter(|| black_box(extractor.extract(black_box(&fragment)).count()));
    });
    group.finish();
}

criterion_group!(benches, bench_split_complete, bench_classify, bench_extract);
criterion_main!(benches);
