//! Encode/decode throughput on synthetic melodies.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use melody_codec::{Event, decode, encode};
use std::hint::black_box;

/// A stepwise line with a rest every eighth event.
fn melody(len: usize) -> Vec<Event> {
    const DURATIONS: [f64; 4] = [0.25, 0.5, 1.0, 1.5];
    (0..len)
        .map(|i| {
            let duration = DURATIONS[i % DURATIONS.len()];
            if i % 8 == 7 {
                Event::rest(duration)
            } else {
                Event::note(60 + (i % 12) as u8, duration)
            }
        })
        .collect()
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for len in [64, 512, 4096] {
        let events = melody(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &events, |b, events| {
            b.iter(|| encode(black_box(events), 0.25))
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for len in [64, 512, 4096] {
        let symbols = encode(&melody(len), 0.25).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(len), &symbols, |b, symbols| {
            b.iter(|| decode(black_box(symbols), 0.25))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
