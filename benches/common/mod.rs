#![allow(dead_code)]

use std::hint::black_box;

use clearing_auction::auction::checkpoint::{account_fully_filled, account_partially_filled};
use clearing_auction::auction::schedule::encode_steps;
use clearing_auction::math::fixed_point::{Demand, ValueX7X7, mps_per_price};
use clearing_auction::math::math_helpers::{mul_div, mul_div_rounding_up};
use clearing_auction::{
    Address, Auction, AuctionParameters, Bytes, CallContext, MPS, Q96, U256,
};
use criterion::{BatchSize, Criterion};

const START: u64 = 1_000;
const BLOCKS: u64 = 100;
const TICKS: u64 = 64;

fn price(units: u64) -> U256 {
    U256::from(units) * Q96
}

fn ctx(block_number: u64) -> CallContext {
    CallContext::new(Address::repeat_byte(0x01), block_number)
}

fn fresh_auction() -> Auction {
    let mut auction = Auction::with_parameters(AuctionParameters {
        floor_price: price(100),
        tick_spacing: price(1),
        auction_steps_data: encode_steps(&[(MPS / BLOCKS as u32, BLOCKS)]),
        start_block: START,
        end_block: START + BLOCKS,
        claim_block: START + BLOCKS,
        total_supply: 1_000_000_000,
        required_currency_raised: 0,
        tokens_recipient: Address::repeat_byte(0xee),
        funds_recipient: Address::repeat_byte(0xff),
    })
    .unwrap();
    auction.on_tokens_received(1_000_000_000).unwrap();
    auction
}

/// An auction with one bid on each of `TICKS` ticks, all admitted at the
/// start block.
fn populated_auction() -> Auction {
    let mut auction = fresh_auction();
    let mut prev = price(100);
    for i in 1..=TICKS {
        let max = price(100 + i);
        auction
            .submit_bid(
                &ctx(START),
                max,
                10_000_000_000 * u128::from(i),
                Address::repeat_byte(i as u8),
                prev,
                Bytes::new(),
            )
            .unwrap();
        prev = max;
    }
    auction
}

pub fn bench_submit_bid(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_bid");

    group.bench_function("new_tick", |b| {
        b.iter_batched(
            fresh_auction,
            |mut auction| {
                black_box(
                    auction
                        .submit_bid(
                            &ctx(START),
                            price(150),
                            1_000_000,
                            Address::repeat_byte(0x02),
                            price(100),
                            Bytes::new(),
                        )
                        .unwrap(),
                )
            },
            BatchSize::SmallInput,
        )
    });

    group.bench_function("existing_tick", |b| {
        b.iter_batched(
            populated_auction,
            |mut auction| {
                black_box(
                    auction
                        .submit_bid(
                            &ctx(START),
                            price(100 + TICKS),
                            1_000_000,
                            Address::repeat_byte(0x02),
                            price(100 + TICKS - 1),
                            Bytes::new(),
                        )
                        .unwrap(),
                )
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

pub fn bench_checkpoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("checkpoint");

    group.bench_function("cross_all_ticks", |b| {
        b.iter_batched(
            populated_auction,
            |mut auction| black_box(auction.checkpoint(&ctx(START + BLOCKS)).unwrap()),
            BatchSize::SmallInput,
        )
    });

    group.bench_function("idempotent", |b| {
        let mut auction = populated_auction();
        auction.checkpoint(&ctx(START + 1)).unwrap();
        b.iter(|| black_box(auction.checkpoint(&ctx(START + 1)).unwrap()))
    });

    group.finish();
}

pub fn bench_fixed_point(c: &mut Criterion) {
    let mut group = c.benchmark_group("fixed_point");

    let a = U256::from(123_456_789_u64) << 150;
    let b = U256::from(987_654_321_u64) << 90;
    let denominator = U256::from(1_000_003_u64) << 100;
    group.bench_function("mul_div", |bench| {
        bench.iter(|| mul_div(black_box(a), black_box(b), black_box(denominator)).unwrap())
    });
    group.bench_function("mul_div_rounding_up", |bench| {
        bench.iter(|| {
            mul_div_rounding_up(black_box(a), black_box(b), black_box(denominator)).unwrap()
        })
    });
    group.bench_function("demand_from_bid", |bench| {
        bench.iter(|| {
            Demand::from_bid(black_box(5_000_000), black_box(price(150)), black_box(7_000_000))
                .unwrap()
        })
    });
    group.bench_function("mps_per_price", |bench| {
        bench.iter(|| mps_per_price(black_box(1_000_000), black_box(price(137))).unwrap())
    });

    group.finish();
}

pub fn bench_bid_accounting(c: &mut Criterion) {
    let mut group = c.benchmark_group("bid_accounting");

    let mut auction = populated_auction();
    let upper = auction.checkpoint(&ctx(START + BLOCKS)).unwrap();
    let lower = auction.get_checkpoint(START).cloned().unwrap();
    let bid = auction.bid(clearing_auction::BidId(TICKS - 1)).unwrap().clone();
    let tick_demand = bid.demand().unwrap().currency_demand_x7.get() * U256::from(3u8);
    let raised = ValueX7X7::from_scaled(upper.currency_raised.get() / U256::from(2u8));

    group.bench_function("fully_filled", |b| {
        b.iter(|| {
            account_fully_filled(black_box(&upper), black_box(&lower), black_box(&bid)).unwrap()
        })
    });
    group.bench_function("partially_filled", |b| {
        b.iter(|| {
            account_partially_filled(black_box(&bid), black_box(tick_demand), black_box(raised))
                .unwrap()
        })
    });

    group.finish();
}
