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

use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc,
};
use std::thread::{self, JoinHandle};

use tracing::{info, warn};
use zerocopy::AsBytes;

use crucible_sdk::net::McastPublisher;
use crucible_sdk::spsc::{RingConsumer, RingProducer, SpscRing};
use crucible_sdk::types::MAX_MARKET_UPDATES;
use crucible_sdk::wire::{MDPMarketUpdate, MEMarketUpdate};

use crate::config::MarketDataConfig;
use crate::error::MarketDataError;
use crate::snapshot::SnapshotSynthesizer;

/// Market-data publisher.
///
/// Drains the matching engine's update ring on a dedicated (optionally
/// pinned) thread, frames each record with the next global incremental
/// sequence number, multicasts it, and forwards the identical framed
/// record onto an internal ring feeding the snapshot synthesizer. The
/// synthesizer is owned here and started/stopped with the publisher so
/// the two halves of the market-data pipeline cannot drift apart.
///
/// Ordering guarantee: sequence numbers are strictly monotonic from 1
/// with no duplicates and no reordering; the stream itself is unreliable
/// multicast and consumers recover losses through the snapshot stream.
pub struct MarketDataPublisher {
	thread_handle: Option<JoinHandle<()>>,
	running: Arc<AtomicBool>,
	synthesizer: Option<SnapshotSynthesizer>,
}

impl MarketDataPublisher {
	pub fn start(
		config: MarketDataConfig,
		from_engine: RingConsumer<MEMarketUpdate>,
	) -> Result<Self, MarketDataError> {
		let socket = McastPublisher::new(config.incremental_group, config.incremental_port)?;

		let (to_synthesizer, from_publisher) =
			SpscRing::<MDPMarketUpdate>::with_capacity(MAX_MARKET_UPDATES);
		let synthesizer = SnapshotSynthesizer::start(config.clone(), from_publisher)?;

		let running = Arc::new(AtomicBool::new(true));
		let running_clone = running.clone();

		let thread_handle = thread::Builder::new()
			.name("market-data-publisher".to_string())
			.spawn(move || {
				if let Some(core_id) = config.publisher_core_id {
					pin_to_core(core_id);
				}
				info!("market data publisher started");
				run_publisher_loop(socket, from_engine, to_synthesizer, &running_clone);
				info!("market data publisher stopped");
			})
			.expect("Failed to spawn market data publisher thread");

		Ok(Self {
			thread_handle: Some(thread_handle),
			running,
			synthesizer: Some(synthesizer),
		})
	}

	pub fn shutdown(mut self) {
		info!("shutting down market data publisher");
		self.running.store(false, Ordering::Release);
		if let Some(handle) = self.thread_handle.take() {
			if let Err(e) = handle.join() {
				warn!(error = ?e, "market data publisher thread panicked");
			}
		}
		if let Some(synthesizer) = self.synthesizer.take() {
			synthesizer.shutdown();
		}
	}
}

impl Drop for MarketDataPublisher {
	fn drop(&mut self) {
		self.running.store(false, Ordering::Release);
		if let Some(handle) = self.thread_handle.take() {
			let _ = handle.join();
		}
		// The owned synthesizer stops through its own Drop.
	}
}

fn run_publisher_loop(
	mut socket: McastPublisher,
	mut from_engine: RingConsumer<MEMarketUpdate>,
	mut to_synthesizer: RingProducer<MDPMarketUpdate>,
	running: &Arc<AtomicBool>,
) {
	let mut next_inc_seq: u64 = 1;

	while running.load(Ordering::Acquire) {
		let mut published_any = false;

		while let Some(update) = from_engine.pop() {
			let framed = MDPMarketUpdate {
				seq_num: next_inc_seq,
				update,
			};

			// The stream is loss-tolerant by design; a send failure
			// costs consumers a recovery round, nothing more.
			if let Err(e) = socket.buffer(framed.as_bytes()) {
				warn!(error = %e, seq_num = next_inc_seq, "incremental send failed");
			}

			to_synthesizer.push(framed);
			next_inc_seq += 1;
			published_any = true;
		}

		if published_any {
			if let Err(e) = socket.flush() {
				warn!(error = %e, "incremental flush failed");
			}
		} else {
			thread::yield_now();
		}
	}
}

fn pin_to_core(core_id: usize) {
	let pinned = core_affinity::get_core_ids()
		.unwrap_or_default()
		.into_iter()
		.find(|c| c.id == core_id)
		.map(core_affinity::set_for_current)
		.unwrap_or(false);
	if pinned {
		info!(core_id, "market data publisher pinned");
	} else {
		warn!(core_id, "could not pin market data publisher to requested core");
	}
}
