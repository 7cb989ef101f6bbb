use criterion::{criterion_group, criterion_main};

mod common;

criterion_group!(
    accounting_benches,
    common::bench_fixed_point,
    common::bench_bid_accounting,
);
criterion_main!(accounting_benches);
