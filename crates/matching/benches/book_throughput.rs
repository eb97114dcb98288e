//! Order book hot-path benchmark: resting inserts, cancels and sweeps.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use crucible_matching::OrderBook;
use crucible_sdk::spsc::SpscRing;
use crucible_sdk::types::Side;

fn bench_insert_and_cancel(c: &mut Criterion) {
	c.bench_function("insert_then_cancel_1k", |b| {
		b.iter(|| {
			let mut book = OrderBook::new(0);
			let (mut resp_tx, mut resp_rx) = SpscRing::with_capacity(8192);
			let (mut upd_tx, mut upd_rx) = SpscRing::with_capacity(8192);

			for i in 0..1_000u64 {
				let price = 100 + (i % 32) as i64;
				book.add(1, i, Side::Buy, price, 10, &mut resp_tx, &mut upd_tx);
			}
			for i in 0..1_000u64 {
				book.cancel(1, i, &mut resp_tx, &mut upd_tx);
			}

			while resp_rx.pop().is_some() {}
			while upd_rx.pop().is_some() {}
			black_box(book.live_order_count())
		})
	});
}

fn bench_sweep(c: &mut Criterion) {
	c.bench_function("sweep_full_side", |b| {
		b.iter(|| {
			let mut book = OrderBook::new(0);
			let (mut resp_tx, mut resp_rx) = SpscRing::with_capacity(8192);
			let (mut upd_tx, mut upd_rx) = SpscRing::with_capacity(8192);

			for i in 0..500u64 {
				let price = 100 + (i % 16) as i64;
				book.add(1, i, Side::Sell, price, 1, &mut resp_tx, &mut upd_tx);
			}
			book.add(2, 1_000, Side::Buy, 200, 500, &mut resp_tx, &mut upd_tx);

			while resp_rx.pop().is_some() {}
			while upd_rx.pop().is_some() {}
			black_box(book.live_order_count())
		})
	});
}

criterion_group!(benches, bench_insert_and_cancel, bench_sweep);
criterion_main!(benches);
