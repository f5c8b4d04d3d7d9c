use std::io::Cursor;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use ptcal_core::store::{TAIL_SCAN_LIMIT, read_tail_lines};
use ptcal_core::{decode, encode, fit, FrameLayout};

// Noisy line: y = 250x - 125 plus a small xorshift perturbation
fn synth_points(n: usize, seed: u32) -> (Vec<f64>, Vec<f64>) {
    let mut state = seed.max(1);
    let mut next = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        f64::from(x) / (f64::from(u32::MAX) + 1.0)
    };
    let x: Vec<f64> = (0..n).map(|i| 0.5 + 3.5 * i as f64 / n as f64).collect();
    let y = x.iter().map(|v| 250.0 * v - 125.0 + (next() - 0.5)).collect();
    (x, y)
}

fn synth_log(pairs: usize, sensors: usize) -> Vec<u8> {
    let mut out = String::new();
    for i in 0..pairs {
        let slopes: Vec<String> = (0..sensors).map(|s| format!("{}", 250.0 + s as f64)).collect();
        let icepts: Vec<String> = (0..sensors).map(|s| format!("{}", -125.0 - s as f64)).collect();
        out.push_str(&format!("{i},x,{}\n{i},y,{}\n", slopes.join(","), icepts.join(",")));
    }
    out.into_bytes()
}

pub fn bench_fit(c: &mut Criterion) {
    let mut g = c.benchmark_group("fit");
    if let Some(n) = std::env::var("BENCH_SAMPLE_SIZE")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
    {
        g.sample_size(n.max(10));
    }
    for n in [4usize, 16, 256] {
        let (x, y) = synth_points(n, 0x5eed);
        g.bench_function(format!("ols_{n}"), |b| {
            b.iter(|| fit(black_box(&x), black_box(&y)))
        });
    }
    g.finish();
}

pub fn bench_tail_scan(c: &mut Criterion) {
    let mut g = c.benchmark_group("tail_scan");
    let log = synth_log(5_000, 16);
    g.bench_function("latest_pair_16_sensors", |b| {
        b.iter(|| {
            let mut cur = Cursor::new(black_box(&log));
            read_tail_lines(&mut cur, 2, TAIL_SCAN_LIMIT)
        })
    });
    g.finish();
}

pub fn bench_decode(c: &mut Criterion) {
    let layout = FrameLayout::new(16, b"\r\n");
    let readings: Vec<f32> = (0..16).map(|i| 0.5 + i as f32 * 0.1).collect();
    let frame = encode(&readings, b"\r\n");
    c.bench_function("decode_16_sensors", |b| {
        b.iter(|| decode(black_box(&frame), &layout))
    });
}

criterion_group!(benches, bench_fit, bench_tail_scan, bench_decode);
criterion_main!(benches);
