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

use tracing::{error, info, warn};
use zerocopy::FromBytes;

use crucible_sdk::net::McastSubscriber;
use crucible_sdk::spsc::RingProducer;
use crucible_sdk::wire::{MDPMarketUpdate, MEMarketUpdate, MDP_MARKET_UPDATE_SIZE};

use crate::config::MarketDataConfig;
use crate::error::MarketDataError;
use crate::sync::{Feed, SnapshotSync, SyncAction};

/// Trading-side market-data receiver.
///
/// Listens on the incremental multicast group and forwards in-sequence
/// records to the trading engine's ring. All protocol intelligence lives
/// in [`SnapshotSync`]; this thread only owns the sockets and reacts to
/// the sync's decisions, joining the snapshot group when a gap opens and
/// dropping the membership again once recovery completes.
pub struct MarketDataConsumer {
	thread_handle: Option<JoinHandle<()>>,
	running: Arc<AtomicBool>,
}

impl MarketDataConsumer {
	pub fn start(
		config: MarketDataConfig,
		downstream: RingProducer<MEMarketUpdate>,
	) -> Result<Self, MarketDataError> {
		let incremental =
			McastSubscriber::join(config.incremental_group, config.incremental_port)?;

		let running = Arc::new(AtomicBool::new(true));
		let running_clone = running.clone();

		let thread_handle = thread::Builder::new()
			.name("market-data-consumer".to_string())
			.spawn(move || {
				info!("market data consumer started");
				run_consumer_loop(&config, incremental, downstream, &running_clone);
				info!("market data consumer stopped");
			})
			.expect("Failed to spawn market data consumer thread");

		Ok(Self {
			thread_handle: Some(thread_handle),
			running,
		})
	}

	pub fn shutdown(mut self) {
		info!("shutting down market data consumer");
		self.running.store(false, Ordering::Release);
		if let Some(handle) = self.thread_handle.take() {
			if let Err(e) = handle.join() {
				warn!(error = ?e, "market data consumer thread panicked");
			}
		}
	}
}

impl Drop for MarketDataConsumer {
	fn drop(&mut self) {
		self.running.store(false, Ordering::Release);
		if let Some(handle) = self.thread_handle.take() {
			let _ = handle.join();
		}
	}
}

fn run_consumer_loop(
	config: &MarketDataConfig,
	mut incremental: McastSubscriber,
	downstream: RingProducer<MEMarketUpdate>,
	running: &Arc<AtomicBool>,
) {
	let mut sync = SnapshotSync::new(downstream);
	let mut snapshot_socket: Option<McastSubscriber> = None;

	while running.load(Ordering::Acquire) {
		let mut received_any = false;

		received_any |= drain_socket(
			&mut incremental,
			Feed::Incremental,
			&mut sync,
			&mut |action| match action {
				SyncAction::None => {}
				SyncAction::JoinSnapshotFeed => {
					if snapshot_socket.is_none() {
						snapshot_socket = Some(join_snapshot_feed(config));
					}
				}
				SyncAction::LeaveSnapshotFeed => {
					// Dropping the socket leaves the group.
					snapshot_socket = None;
				}
			},
		);

		// The snapshot membership only exists while recovering. A leave
		// decided while draining the snapshot socket itself is deferred
		// so the socket is not dropped mid-drain.
		let mut leave = false;
		if let Some(socket) = snapshot_socket.as_mut() {
			received_any |= drain_socket(socket, Feed::Snapshot, &mut sync, &mut |action| {
				if action == SyncAction::LeaveSnapshotFeed {
					leave = true;
				}
			});
		}
		if leave {
			snapshot_socket = None;
		}

		if !received_any {
			thread::yield_now();
		}
	}
}

fn join_snapshot_feed(config: &MarketDataConfig) -> McastSubscriber {
	match McastSubscriber::join(config.snapshot_group, config.snapshot_port) {
		Ok(socket) => socket,
		Err(e) => {
			// The sync is now in recovery and will never re-issue the
			// join; stalling silently with no snapshot feed would wedge
			// the consumer forever.
			error!(error = %e, "failed to join snapshot group");
			panic!("cannot join the snapshot multicast group");
		}
	}
}

/// Pull every queued datagram off `socket`, split it into frames and run
/// each through the sync, handing the sync's decisions to `on_action`.
fn drain_socket(
	socket: &mut McastSubscriber,
	feed: Feed,
	sync: &mut SnapshotSync,
	on_action: &mut dyn FnMut(SyncAction),
) -> bool {
	let mut received_any = false;

	loop {
		let datagram = match socket.recv() {
			Ok(Some(datagram)) => datagram,
			Ok(None) => break,
			Err(e) => {
				error!(error = %e, ?feed, "multicast receive failed");
				break;
			}
		};
		received_any = true;

		for frame in datagram.chunks_exact(MDP_MARKET_UPDATE_SIZE) {
			let framed = match MDPMarketUpdate::read_from(frame) {
				Some(framed) => framed,
				None => {
					error!(len = frame.len(), "unreadable market data frame");
					continue;
				}
			};

			on_action(sync.on_record(feed, &framed));
		}
	}

	received_any
}
