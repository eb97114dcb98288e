// Copyright 2025 itscheems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::BTreeMap;
use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{info, warn};
use zerocopy::AsBytes;

use crucible_sdk::net::McastPublisher;
use crucible_sdk::spsc::RingConsumer;
use crucible_sdk::types::{OrderId, MAX_TICKERS};
use crucible_sdk::wire::{MDPMarketUpdate, MEMarketUpdate, MarketUpdateType};

use crate::config::MarketDataConfig;
use crate::error::MarketDataError;

/// Last-known-state view of every live order, per instrument, built from
/// the incremental stream.
///
/// This is a much simpler container than the matching engine's book: the
/// snapshot only needs each live order's latest price and quantity, keyed
/// by market order id. `BTreeMap` gives the deterministic ascending
/// iteration the snapshot cycle format requires.
///
/// The synthesizer consumes a private copy of the exact records the
/// publisher sent, so any inconsistency here (an add for an existing id,
/// a cancel for a missing one, a sequence gap) is a bug in the pipeline
/// and terminates the process.
pub struct SnapshotState {
	ticker_orders: Vec<BTreeMap<OrderId, MEMarketUpdate>>,
	last_inc_seq: u64,
}

impl SnapshotState {
	pub fn new() -> Self {
		Self {
			ticker_orders: (0..MAX_TICKERS).map(|_| BTreeMap::new()).collect(),
			last_inc_seq: 0,
		}
	}

	/// Incremental sequence number of the last applied record.
	pub fn last_inc_seq(&self) -> u64 {
		self.last_inc_seq
	}

	/// Live orders currently tracked for `ticker_id`.
	pub fn live_orders(&self, ticker_id: u32) -> usize {
		self.ticker_orders[ticker_id as usize].len()
	}

	/// Fold one published incremental record into the shadow books.
	pub fn apply(&mut self, framed: &MDPMarketUpdate) {
		let update = framed.update;
		let seq_num = framed.seq_num;

		match update.update_type() {
			MarketUpdateType::Add => {
				let orders = &mut self.ticker_orders[update.ticker_id as usize];
				let order_id = update.order_id;
				let previous = orders.insert(order_id, update);
				assert!(
					previous.is_none(),
					"snapshot add for an order that already exists: {}",
					update
				);
			}
			MarketUpdateType::Modify => {
				let orders = &mut self.ticker_orders[update.ticker_id as usize];
				let order_id = update.order_id;
				let stored = orders
					.get_mut(&order_id)
					.unwrap_or_else(|| panic!("snapshot modify for a missing order: {}", update));
				assert!(
					stored.side == update.side,
					"snapshot modify changed the side of order {}",
					order_id
				);
				// Quantity and price move; the stored record keeps its
				// ADD type so cycle republication emits plain adds.
				stored.qty = update.qty;
				stored.price = update.price;
			}
			MarketUpdateType::Cancel => {
				let orders = &mut self.ticker_orders[update.ticker_id as usize];
				let order_id = update.order_id;
				let removed = orders.remove(&order_id);
				assert!(
					removed.is_some(),
					"snapshot cancel for a missing order: {}",
					update
				);
			}
			MarketUpdateType::Trade
			| MarketUpdateType::Clear
			| MarketUpdateType::SnapshotStart
			| MarketUpdateType::SnapshotEnd
			| MarketUpdateType::Invalid => {}
		}

		assert!(
			seq_num == self.last_inc_seq + 1,
			"incremental sequence gap inside the exchange: expected {}, got {}",
			self.last_inc_seq + 1,
			seq_num
		);
		self.last_inc_seq = seq_num;
	}

	/// Produce one complete snapshot cycle: START, then per instrument a
	/// CLEAR followed by one ADD per live order in ascending order id,
	/// then END. Cycle sequence numbers restart at 0; START and END
	/// carry `last_inc_seq` in their order-id field so consumers can
	/// splice buffered incrementals onto the snapshot.
	pub fn build_cycle(&self) -> Vec<MDPMarketUpdate> {
		let mut cycle = Vec::new();
		let mut seq_num = 0u64;
		let mut push = |cycle: &mut Vec<MDPMarketUpdate>, update: MEMarketUpdate| {
			cycle.push(MDPMarketUpdate {
				seq_num,
				update,
			});
			seq_num += 1;
		};

		push(&mut cycle, MEMarketUpdate::snapshot_start(self.last_inc_seq));
		for ticker_id in 0..MAX_TICKERS as u32 {
			push(&mut cycle, MEMarketUpdate::clear(ticker_id));
			for order in self.ticker_orders[ticker_id as usize].values() {
				push(&mut cycle, *order);
			}
		}
		push(&mut cycle, MEMarketUpdate::snapshot_end(self.last_inc_seq));

		cycle
	}
}

impl Default for SnapshotState {
	fn default() -> Self {
		Self::new()
	}
}

/// Snapshot synthesizer worker.
///
/// Runs on its own thread so cycle construction and the second multicast
/// socket never touch the publisher's latency-critical path. The thread
/// drains the publisher's forwarding ring into a `SnapshotState` and
/// publishes a full cycle on the snapshot group every
/// `snapshot_interval_secs`.
pub struct SnapshotSynthesizer {
	thread_handle: Option<JoinHandle<()>>,
	running: Arc<AtomicBool>,
}

impl SnapshotSynthesizer {
	pub fn start(
		config: MarketDataConfig,
		from_publisher: RingConsumer<MDPMarketUpdate>,
	) -> Result<Self, MarketDataError> {
		let socket = McastPublisher::new(config.snapshot_group, config.snapshot_port)?;

		let running = Arc::new(AtomicBool::new(true));
		let running_clone = running.clone();

		let thread_handle = thread::Builder::new()
			.name("snapshot-synthesizer".to_string())
			.spawn(move || {
				info!("snapshot synthesizer started");
				run_snapshot_loop(&config, socket, from_publisher, &running_clone);
				info!("snapshot synthesizer stopped");
			})
			.expect("Failed to spawn snapshot synthesizer thread");

		Ok(Self {
			thread_handle: Some(thread_handle),
			running,
		})
	}

	pub fn shutdown(mut self) {
		info!("shutting down snapshot synthesizer");
		self.running.store(false, Ordering::Release);
		if let Some(handle) = self.thread_handle.take() {
			if let Err(e) = handle.join() {
				warn!(error = ?e, "snapshot synthesizer thread panicked");
			}
		}
	}
}

impl Drop for SnapshotSynthesizer {
	fn drop(&mut self) {
		self.running.store(false, Ordering::Release);
		if let Some(handle) = self.thread_handle.take() {
			let _ = handle.join();
		}
	}
}

fn run_snapshot_loop(
	config: &MarketDataConfig,
	mut socket: McastPublisher,
	mut from_publisher: RingConsumer<MDPMarketUpdate>,
	running: &Arc<AtomicBool>,
) {
	let interval = Duration::from_secs(config.snapshot_interval_secs);
	let mut state = SnapshotState::new();
	let mut last_cycle = Instant::now();

	while running.load(Ordering::Acquire) {
		let mut applied_any = false;
		while let Some(framed) = from_publisher.pop() {
			state.apply(&framed);
			applied_any = true;
		}

		if last_cycle.elapsed() >= interval {
			last_cycle = Instant::now();
			publish_cycle(&state, &mut socket);
		}

		if !applied_any {
			thread::sleep(Duration::from_millis(1));
		}
	}
}

fn publish_cycle(state: &SnapshotState, socket: &mut McastPublisher) {
	let cycle = state.build_cycle();
	let start = Instant::now();

	for framed in &cycle {
		if let Err(e) = socket.buffer(framed.as_bytes()) {
			warn!(error = %e, "snapshot send failed; consumers will catch the next cycle");
			return;
		}
	}
	if let Err(e) = socket.flush() {
		warn!(error = %e, "snapshot flush failed; consumers will catch the next cycle");
		return;
	}

	info!(
		records = cycle.len(),
		last_inc_seq = state.last_inc_seq(),
		elapsed_us = start.elapsed().as_micros() as u64,
		"snapshot cycle published"
	);
}

#[cfg(test)]
mod tests {
	use super::*;
	use crucible_sdk::types::Side;

	fn add(seq_num: u64, ticker_id: u32, order_id: u64, price: i64, qty: u32) -> MDPMarketUpdate {
		MDPMarketUpdate {
			seq_num,
			update: MEMarketUpdate {
				kind: MarketUpdateType::Add as u8,
				order_id,
				ticker_id,
				side: Side::Buy.to_wire(),
				price,
				qty,
				priority: 1,
			},
		}
	}

	fn modify(seq_num: u64, ticker_id: u32, order_id: u64, price: i64, qty: u32) -> MDPMarketUpdate {
		let mut framed = add(seq_num, ticker_id, order_id, price, qty);
		framed.update.kind = MarketUpdateType::Modify as u8;
		framed
	}

	fn cancel(seq_num: u64, ticker_id: u32, order_id: u64) -> MDPMarketUpdate {
		let mut framed = add(seq_num, ticker_id, order_id, 0, 0);
		framed.update.kind = MarketUpdateType::Cancel as u8;
		framed
	}

	#[test]
	fn test_add_modify_cancel_lifecycle() {
		let mut state = SnapshotState::new();

		state.apply(&add(1, 0, 10, 100, 5));
		assert_eq!(state.live_orders(0), 1);

		state.apply(&modify(2, 0, 10, 101, 3));
		assert_eq!(state.live_orders(0), 1);

		// The stored record keeps the ADD type but tracks new values.
		let cycle = state.build_cycle();
		let stored = cycle
			.iter()
			.map(|f| f.update)
			.find(|u| u.update_type() == MarketUpdateType::Add)
			.unwrap();
		let (price, qty) = (stored.price, stored.qty);
		assert_eq!((price, qty), (101, 3));

		state.apply(&cancel(3, 0, 10));
		assert_eq!(state.live_orders(0), 0);
		assert_eq!(state.last_inc_seq(), 3);
	}

	#[test]
	fn test_trades_do_not_change_snapshot_state() {
		let mut state = SnapshotState::new();
		state.apply(&add(1, 0, 10, 100, 5));

		let mut trade = add(2, 0, 10, 100, 2);
		trade.update.kind = MarketUpdateType::Trade as u8;
		state.apply(&trade);

		assert_eq!(state.live_orders(0), 1);
		assert_eq!(state.last_inc_seq(), 2);
	}

	#[test]
	fn test_cycle_layout_and_numbering() {
		let mut state = SnapshotState::new();
		state.apply(&add(1, 0, 20, 100, 5));
		state.apply(&add(2, 0, 10, 101, 1));
		state.apply(&add(3, 2, 30, 102, 2));

		let cycle = state.build_cycle();
		// START + one CLEAR per ticker + three ADDs + END.
		assert_eq!(cycle.len(), 1 + MAX_TICKERS + 3 + 1);

		// Cycle-local sequence numbers restart at 0 and are contiguous.
		for (i, framed) in cycle.iter().enumerate() {
			let seq_num = framed.seq_num;
			assert_eq!(seq_num, i as u64);
		}

		assert_eq!(
			cycle.first().unwrap().update.update_type(),
			MarketUpdateType::SnapshotStart
		);
		assert_eq!(
			cycle.last().unwrap().update.update_type(),
			MarketUpdateType::SnapshotEnd
		);

		// START and END carry the incremental anchor.
		let (start_anchor, end_anchor) = (
			cycle.first().unwrap().update.order_id,
			cycle.last().unwrap().update.order_id,
		);
		assert_eq!((start_anchor, end_anchor), (3, 3));

		// Ticker 0's section: CLEAR, then ADDs in ascending order id.
		assert_eq!(cycle[1].update.update_type(), MarketUpdateType::Clear);
		let t0_ticker = cycle[1].update.ticker_id;
		assert_eq!(t0_ticker, 0);
		let (first_oid, second_oid) = (cycle[2].update.order_id, cycle[3].update.order_id);
		assert_eq!((first_oid, second_oid), (10, 20));
	}

	#[test]
	#[should_panic(expected = "incremental sequence gap")]
	fn test_sequence_gap_is_fatal() {
		let mut state = SnapshotState::new();
		state.apply(&add(1, 0, 10, 100, 5));
		state.apply(&add(3, 0, 11, 100, 5));
	}

	#[test]
	#[should_panic(expected = "already exists")]
	fn test_duplicate_add_is_fatal() {
		let mut state = SnapshotState::new();
		state.apply(&add(1, 0, 10, 100, 5));
		state.apply(&add(2, 0, 10, 100, 5));
	}
}
