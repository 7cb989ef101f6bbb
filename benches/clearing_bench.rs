use criterion::{criterion_group, criterion_main};

mod common;

criterion_group!(
    clearing_benches,
    common::bench_submit_bid,
    common::bench_checkpoint,
);
criterion_main!(clearing_benches);
