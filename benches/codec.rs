use criterion::{black_box, criterion_group, criterion_main, Criterion};
use num_complex::Complex;
use usrp_source_rs::convert::{complex_to_wire, wire_to_complex};
use usrp_source_rs::SampleFormat;

const CHUNK: usize = 8192;

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("wire_to_complex");

    let sc16 = vec![0x5Au8; CHUNK * 4];
    group.bench_function("sc16_8k", |b| {
        let mut out = Vec::with_capacity(CHUNK);
        b.iter(|| {
            out.clear();
            wire_to_complex(SampleFormat::Sc16, black_box(&sc16), &mut out)
        });
    });

    let fc32 = vec![0x3Eu8; CHUNK * 8];
    group.bench_function("fc32_8k", |b| {
        let mut out = Vec::with_capacity(CHUNK);
        b.iter(|| {
            out.clear();
            wire_to_complex(SampleFormat::Fc32, black_box(&fc32), &mut out)
        });
    });

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("complex_to_wire");

    let samples: Vec<Complex<f32>> = (0..CHUNK)
        .map(|i| {
            let phase = i as f32 * 0.01;
            Complex::new(phase.cos() * 0.7, phase.sin() * 0.7)
        })
        .collect();

    group.bench_function("sc16_8k", |b| {
        let mut wire = Vec::with_capacity(CHUNK * 4);
        b.iter(|| {
            wire.clear();
            complex_to_wire(SampleFormat::Sc16, black_box(&samples), &mut wire);
        });
    });

    group.bench_function("fc32_8k", |b| {
        let mut wire = Vec::with_capacity(CHUNK * 8);
        b.iter(|| {
            wire.clear();
            complex_to_wire(SampleFormat::Fc32, black_box(&samples), &mut wire);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_decode, bench_encode);
criterion_main!(benches);
