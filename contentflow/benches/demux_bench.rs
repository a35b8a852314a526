//! Benchmarks for stream frame demultiplexing.

use contentflow::streaming::{demultiplex, FrameDecoder};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn sse_body(tokens: usize) -> String {
    let mut body = String::from("event: progress\ndata: {\"percent\": 5, \"message\": \"Starting...\"}\n\n");
    for i in 1..=tokens {
        body.push_str(&format!(
            "event: token\ndata: {{\"length\": {}, \"percent\": {}}}\n\n",
            i * 42,
            5 + (i * 90 / tokens)
        ));
    }
    body.push_str("event: complete\ndata: {\"success\": true, \"article\": \"Done\"}\n\n");
    body
}

fn demux_benchmark(c: &mut Criterion) {
    let body = sse_body(500);

    c.bench_function("demultiplex_whole_body", |b| {
        b.iter(|| demultiplex(black_box(&body)))
    });

    c.bench_function("decoder_64_byte_chunks", |b| {
        b.iter(|| {
            let mut decoder = FrameDecoder::new();
            let mut frames = 0;
            for chunk in body.as_bytes().chunks(64) {
                frames += decoder.push_bytes(black_box(chunk)).len();
            }
            frames
        })
    });
}

criterion_group!(benches, demux_benchmark);
criterion_main!(benches);
