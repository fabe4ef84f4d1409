use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use ledger_ingress::builder::{TxBuilder, TxKind};
use ledger_ingress::crypto::TxSigner;
use ledger_ingress::dispatch::AdmissionLimiter;

fn bench_builder(c: &mut Criterion) {
    let builder = TxBuilder::new(TxSigner::generate(), None);

    c.bench_function("build_transfer", |b| {
        b.iter(|| black_box(builder.build(TxKind::Transfer).unwrap()))
    });

    let mut group = c.benchmark_group("build_write");
    for size in [64usize, 1024, 16 * 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| black_box(builder.build(TxKind::Write { size }).unwrap()))
        });
    }
    group.finish();
}

fn bench_limiter(c: &mut Criterion) {
    let limiter = AdmissionLimiter::new(1000);

    c.bench_function("limiter_allow_release", |b| {
        b.iter(|| {
            if black_box(limiter.allow()) {
                limiter.release();
            }
        })
    });
}

criterion_group!(benches, bench_builder, bench_limiter);
criterion_main!(benches);
