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

use tracing::{debug, info, warn};

use crucible_sdk::spsc::RingProducer;
use crucible_sdk::wire::{MDPMarketUpdate, MEMarketUpdate, MarketUpdateType};

/// Which multicast stream a record was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
	Incremental,
	Snapshot,
}

/// What the consumer thread must do after feeding a record in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
	/// Keep going; nothing changed.
	None,
	/// A gap was detected: recovery began, join the snapshot group.
	JoinSnapshotFeed,
	/// Recovery completed: leave the snapshot group.
	LeaveSnapshotFeed,
}

/// Gap detection and snapshot resynchronization for the incremental
/// market-data stream.
///
/// This is the consumer's entire protocol brain, kept free of sockets so
/// it can be driven record-by-record in tests; the consumer thread owns
/// the sockets and acts on the returned `SyncAction`s.
///
/// Normal path: records whose sequence number matches `next_expected` go
/// straight downstream. A higher number means loss on the unreliable
/// feed: both queues are cleared and every subsequent record is buffered
/// by sequence number until one snapshot cycle plus the incrementals
/// after its anchor can be replayed as a single consistent prefix.
/// Records below `next_expected` are stale duplicates and are dropped.
pub struct SnapshotSync {
	next_expected_inc_seq: u64,
	in_recovery: bool,
	snapshot_queued: BTreeMap<u64, MEMarketUpdate>,
	incremental_queued: BTreeMap<u64, MEMarketUpdate>,
	downstream: RingProducer<MEMarketUpdate>,
}

impl SnapshotSync {
	pub fn new(downstream: RingProducer<MEMarketUpdate>) -> Self {
		Self {
			next_expected_inc_seq: 1,
			in_recovery: false,
			snapshot_queued: BTreeMap::new(),
			incremental_queued: BTreeMap::new(),
			downstream,
		}
	}

	pub fn in_recovery(&self) -> bool {
		self.in_recovery
	}

	pub fn next_expected(&self) -> u64 {
		self.next_expected_inc_seq
	}

	/// Feed one framed record from either stream.
	pub fn on_record(&mut self, feed: Feed, framed: &MDPMarketUpdate) -> SyncAction {
		let seq_num = framed.seq_num;
		let update = framed.update;

		if !self.in_recovery {
			match feed {
				Feed::Snapshot => {
					// Multicast keeps delivering snapshot cycles after a
					// recovery finishes; outside recovery they carry
					// nothing we need.
					debug!(seq_num, "discarding snapshot record outside recovery");
					return SyncAction::None;
				}
				Feed::Incremental => {
					if seq_num == self.next_expected_inc_seq {
						self.next_expected_inc_seq += 1;
						self.downstream.push(update);
						return SyncAction::None;
					}
					if seq_num < self.next_expected_inc_seq {
						debug!(
							seq_num,
							next_expected = self.next_expected_inc_seq,
							"discarding stale incremental record"
						);
						return SyncAction::None;
					}

					warn!(
						expected = self.next_expected_inc_seq,
						received = seq_num,
						"incremental gap detected, entering recovery"
					);
					self.in_recovery = true;
					self.snapshot_queued.clear();
					self.incremental_queued.clear();
					self.queue_record(feed, seq_num, update);
					return SyncAction::JoinSnapshotFeed;
				}
			}
		}

		self.queue_record(feed, seq_num, update);
		if self.check_snapshot_sync() {
			SyncAction::LeaveSnapshotFeed
		} else {
			SyncAction::None
		}
	}

	fn queue_record(&mut self, feed: Feed, seq_num: u64, update: MEMarketUpdate) {
		match feed {
			Feed::Snapshot => {
				if self.snapshot_queued.contains_key(&seq_num) {
					// Cycle-local sequence numbers repeating means a new
					// cycle began before the previous one completed;
					// restart snapshot collection from scratch.
					warn!(
						seq_num,
						"snapshot sequence number seen twice, restarting snapshot collection"
					);
					self.snapshot_queued.clear();
				}
				self.snapshot_queued.insert(seq_num, update);
			}
			Feed::Incremental => {
				self.incremental_queued.insert(seq_num, update);
			}
		}
	}

	/// Try to assemble a consistent recovered view from the queued
	/// snapshot cycle and incrementals. Returns true when the view was
	/// delivered downstream and normal processing resumed.
	fn check_snapshot_sync(&mut self) -> bool {
		// A cycle can only be assembled once its START has been seen;
		// anything queued before that belongs to a cycle we missed the
		// beginning of.
		let first = match self.snapshot_queued.iter().next() {
			Some((_, update)) => *update,
			None => return false,
		};
		if first.update_type() != MarketUpdateType::SnapshotStart {
			debug!("have not seen SNAPSHOT_START yet, dropping partial snapshot data");
			self.snapshot_queued.clear();
			return false;
		}

		// The cycle must be gapless from 0.
		let mut next_snapshot_seq = 0u64;
		for (&seq_num, _) in self.snapshot_queued.iter() {
			if seq_num != next_snapshot_seq {
				debug!(
					expected = next_snapshot_seq,
					found = seq_num,
					"snapshot stream gap, waiting for more data"
				);
				return false;
			}
			next_snapshot_seq += 1;
		}

		// And complete: the highest record must be the END marker.
		let last = *self
			.snapshot_queued
			.iter()
			.next_back()
			.expect("non-empty checked above")
			.1;
		if last.update_type() != MarketUpdateType::SnapshotEnd {
			debug!("have not seen SNAPSHOT_END yet, waiting for more data");
			return false;
		}

		// Incrementals must continue seamlessly from the snapshot's
		// anchor; entries at or below the anchor are already baked in.
		let anchor = last.order_id;
		let mut next_inc_seq = anchor + 1;
		let mut deliverable_incrementals = 0usize;
		for (&seq_num, _) in self.incremental_queued.iter() {
			if seq_num < next_inc_seq {
				continue;
			}
			if seq_num != next_inc_seq {
				debug!(
					expected = next_inc_seq,
					found = seq_num,
					"incremental stream gap after anchor, waiting for more data"
				);
				return false;
			}
			next_inc_seq += 1;
			deliverable_incrementals += 1;
		}

		// Atomic hand-off: the whole recovered view goes downstream in
		// one uninterrupted run.
		for (_, update) in self.snapshot_queued.iter() {
			match update.update_type() {
				MarketUpdateType::SnapshotStart | MarketUpdateType::SnapshotEnd => {}
				_ => self.downstream.push(*update),
			}
		}
		for (&seq_num, update) in self.incremental_queued.iter() {
			if seq_num > anchor {
				self.downstream.push(*update);
			}
		}

		info!(
			snapshot_records = self.snapshot_queued.len() - 2,
			incremental_records = deliverable_incrementals,
			anchor,
			resume_at = next_inc_seq,
			"recovery complete"
		);

		self.next_expected_inc_seq = next_inc_seq;
		self.snapshot_queued.clear();
		self.incremental_queued.clear();
		self.in_recovery = false;

		true
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crucible_sdk::spsc::{RingConsumer, SpscRing};
	use crucible_sdk::types::Side;

	fn inc_add(seq_num: u64, order_id: u64) -> MDPMarketUpdate {
		MDPMarketUpdate {
			seq_num,
			update: MEMarketUpdate {
				kind: MarketUpdateType::Add as u8,
				order_id,
				ticker_id: 0,
				side: Side::Buy.to_wire(),
				price: 100,
				qty: 1,
				priority: 1,
			},
		}
	}

	fn snap(seq_num: u64, update: MEMarketUpdate) -> MDPMarketUpdate {
		MDPMarketUpdate {
			seq_num,
			update,
		}
	}

	fn harness() -> (SnapshotSync, RingConsumer<MEMarketUpdate>) {
		let (producer, consumer) = SpscRing::with_capacity(4096);
		(SnapshotSync::new(producer), consumer)
	}

	fn drain(consumer: &mut RingConsumer<MEMarketUpdate>) -> Vec<MEMarketUpdate> {
		let mut out = Vec::new();
		while let Some(update) = consumer.pop() {
			out.push(update);
		}
		out
	}

	#[test]
	fn test_in_sequence_records_flow_straight_through() {
		let (mut sync, mut downstream) = harness();

		for seq_num in 1..=5 {
			assert_eq!(
				sync.on_record(Feed::Incremental, &inc_add(seq_num, seq_num)),
				SyncAction::None
			);
		}

		assert_eq!(drain(&mut downstream).len(), 5);
		assert_eq!(sync.next_expected(), 6);
		assert!(!sync.in_recovery());
	}

	#[test]
	fn test_gap_enters_recovery_and_stale_duplicates_do_not() {
		let (mut sync, mut downstream) = harness();

		assert_eq!(
			sync.on_record(Feed::Incremental, &inc_add(1, 1)),
			SyncAction::None
		);
		// Stale duplicate: dropped, no recovery.
		assert_eq!(
			sync.on_record(Feed::Incremental, &inc_add(1, 1)),
			SyncAction::None
		);
		assert!(!sync.in_recovery());

		// Gap: 3 while 2 was expected.
		assert_eq!(
			sync.on_record(Feed::Incremental, &inc_add(3, 3)),
			SyncAction::JoinSnapshotFeed
		);
		assert!(sync.in_recovery());
		// Nothing new reaches downstream while recovering.
		assert_eq!(drain(&mut downstream).len(), 1);
	}

	#[test]
	fn test_snapshot_outside_recovery_is_discarded() {
		let (mut sync, mut downstream) = harness();

		let record = snap(0, MEMarketUpdate::snapshot_start(10));
		assert_eq!(sync.on_record(Feed::Snapshot, &record), SyncAction::None);
		assert!(drain(&mut downstream).is_empty());
		assert!(!sync.in_recovery());
	}

	#[test]
	fn test_partial_snapshot_without_start_is_dropped() {
		let (mut sync, _downstream) = harness();

		sync.on_record(Feed::Incremental, &inc_add(5, 5));
		assert!(sync.in_recovery());

		// Mid-cycle record without a START; collection resets and the
		// next full cycle can still assemble.
		sync.on_record(Feed::Snapshot, &snap(3, MEMarketUpdate::clear(0)));
		assert!(sync.in_recovery());
	}

	#[test]
	fn test_repeated_snapshot_seq_restarts_collection() {
		let (mut sync, mut downstream) = harness();

		sync.on_record(Feed::Incremental, &inc_add(5, 5));

		// First, half of a cycle anchored at 2.
		sync.on_record(Feed::Snapshot, &snap(0, MEMarketUpdate::snapshot_start(2)));
		sync.on_record(Feed::Snapshot, &snap(1, MEMarketUpdate::clear(0)));

		// A new cycle begins (seq 0 again) anchored at 4; the old
		// partial cycle must not leak into it.
		sync.on_record(Feed::Snapshot, &snap(0, MEMarketUpdate::snapshot_start(4)));
		for (i, ticker_id) in (0..8u32).enumerate() {
			sync.on_record(
				Feed::Snapshot,
				&snap(1 + i as u64, MEMarketUpdate::clear(ticker_id)),
			);
		}
		let action = sync.on_record(Feed::Snapshot, &snap(9, MEMarketUpdate::snapshot_end(4)));
		assert_eq!(action, SyncAction::LeaveSnapshotFeed);
		assert!(!sync.in_recovery());

		// Empty book snapshot: eight CLEARs, then the queued 5.
		let delivered = drain(&mut downstream);
		assert_eq!(delivered.len(), 9);
		assert_eq!(
			delivered[8].update_type(),
			MarketUpdateType::Add
		);
		assert_eq!(sync.next_expected(), 6);
	}

	#[test]
	fn test_waits_for_post_anchor_incrementals() {
		let (mut sync, mut downstream) = harness();

		sync.on_record(Feed::Incremental, &inc_add(10, 10));
		assert!(sync.in_recovery());

		// 14 will sit above the snapshot anchor with a hole at 13.
		sync.on_record(Feed::Incremental, &inc_add(14, 14));

		// Complete snapshot anchored at 12, but incremental 13 has not
		// arrived yet: recovery must wait.
		sync.on_record(Feed::Snapshot, &snap(0, MEMarketUpdate::snapshot_start(12)));
		for (i, ticker_id) in (0..8u32).enumerate() {
			sync.on_record(
				Feed::Snapshot,
				&snap(1 + i as u64, MEMarketUpdate::clear(ticker_id)),
			);
		}
		let action = sync.on_record(Feed::Snapshot, &snap(9, MEMarketUpdate::snapshot_end(12)));
		assert_eq!(action, SyncAction::None);
		assert!(sync.in_recovery());
		assert!(drain(&mut downstream).is_empty());

		// 13 closes the hole: snapshot payload plus 13 and 14 deliver.
		// Queued 10 is below the anchor and is already baked into the
		// snapshot, so it is dropped.
		assert_eq!(
			sync.on_record(Feed::Incremental, &inc_add(13, 13)),
			SyncAction::LeaveSnapshotFeed
		);
		let delivered = drain(&mut downstream);
		assert_eq!(delivered.len(), 8 + 2);
		assert_eq!(sync.next_expected(), 15);
		assert!(!sync.in_recovery());
	}

	#[test]
	fn test_snapshot_alone_recovers_when_nothing_queued_past_anchor() {
		let (mut sync, mut downstream) = harness();

		sync.on_record(Feed::Incremental, &inc_add(10, 10));
		assert!(sync.in_recovery());

		// Anchor 12 covers everything queued so far; the snapshot by
		// itself is a consistent view.
		sync.on_record(Feed::Snapshot, &snap(0, MEMarketUpdate::snapshot_start(12)));
		for (i, ticker_id) in (0..8u32).enumerate() {
			sync.on_record(
				Feed::Snapshot,
				&snap(1 + i as u64, MEMarketUpdate::clear(ticker_id)),
			);
		}
		let action = sync.on_record(Feed::Snapshot, &snap(9, MEMarketUpdate::snapshot_end(12)));
		assert_eq!(action, SyncAction::LeaveSnapshotFeed);
		assert!(!sync.in_recovery());
		assert_eq!(drain(&mut downstream).len(), 8);
		assert_eq!(sync.next_expected(), 13);
	}
}
