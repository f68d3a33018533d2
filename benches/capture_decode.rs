//! Capture decode throughput
//!
//! Measures big-endian parsing of full half-buffer capture reads, the work
//! the ADC drainer does on every read during a session.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use usbloop::stream::buffer::CaptureChunks;
use usbloop::stream::protocol::{decode_be_samples, ADC_HALF_BUFFER_SIZE};

fn half_buffer_read() -> Vec<u8> {
    (0..ADC_HALF_BUFFER_SIZE / 2)
        .flat_map(|i| (i as i16).to_be_bytes())
        .collect()
}

fn bench_decode(c: &mut Criterion) {
    let read = half_buffer_read();
    let mut group = c.benchmark_group("capture_decode");
    group.throughput(Throughput::Bytes(read.len() as u64));

    group.bench_function("decode_be_samples", |b| {
        b.iter(|| {
            let mut carry = None;
            decode_be_samples(black_box(&read), &mut carry)
        })
    });

    group.bench_function("odd_split_reads", |b| {
        let (first, second) = read.split_at(read.len() / 2 + 1);
        b.iter(|| {
            let mut carry = None;
            let mut samples = decode_be_samples(black_box(first), &mut carry);
            samples.extend(decode_be_samples(black_box(second), &mut carry));
            samples
        })
    });

    group.bench_function("capture_chunks_x16", |b| {
        b.iter(|| {
            let mut chunks = CaptureChunks::new();
            for _ in 0..16 {
                chunks.push_bytes(black_box(&read));
            }
            chunks.into_buffer(96000)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_decode);
criterion_main!(benches);
