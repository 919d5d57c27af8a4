use criterion::{criterion_group, BatchSize, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};
use strata_wire::{decode, varint};

fn bench_varint(c: &mut Criterion) {
    for bits in [7, 14, 35, 64] {
        let mut sampler = StdRng::seed_from_u64(0);
        let values: Vec<u64> = (0..10_000)
            .map(|_| sampler.gen::<u64>() >> (64 - bits))
            .collect();
        let mut encoded = Vec::new();
        for value in &values {
            varint::write(*value, &mut encoded);
        }

        c.bench_function(&format!("{}/write bits={}", module_path!(), bits), |b| {
            b.iter_batched(
                || Vec::with_capacity(encoded.len()),
                |mut buf| {
                    for value in &values {
                        varint::write(*value, &mut buf);
                    }
                    buf
                },
                BatchSize::SmallInput,
            )
        });

        c.bench_function(&format!("{}/decode bits={}", module_path!(), bits), |b| {
            b.iter(|| {
                let mut regs = decode::Registers::default();
                let mut pos = 0;
                while pos < encoded.len() {
                    pos = decode::decode_varint(&encoded, pos, &mut regs).unwrap();
                }
            })
        });
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_varint
}
