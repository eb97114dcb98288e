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

use tracing::debug;

use crucible_sdk::spsc::RingProducer;
use crucible_sdk::types::MAX_PENDING_REQUESTS;
use crucible_sdk::wire::MEClientRequest;

/// Reorders one poll cycle's worth of client requests by receive time
/// before they reach the matching engine.
///
/// TCP segments from different clients land in the same gateway poll
/// batch in whatever order the sockets are drained; releasing them in
/// non-decreasing receive-timestamp order (ties keep insertion order)
/// makes matching deterministic with respect to wall-clock arrival.
///
/// The sequencer does NOT:
/// - Reorder across poll cycles
/// - Validate sequence numbers (the session table already has)
/// - Apply any prioritization beyond the receive timestamp
pub struct FifoSequencer {
	pending: Vec<TimedRequest>,
	to_engine: RingProducer<MEClientRequest>,
}

struct TimedRequest {
	rx_time_ns: u64,
	request: MEClientRequest,
}

impl FifoSequencer {
	pub fn new(to_engine: RingProducer<MEClientRequest>) -> Self {
		Self {
			pending: Vec::with_capacity(MAX_PENDING_REQUESTS),
			to_engine,
		}
	}

	/// Buffer a validated request together with its receive timestamp.
	///
	/// Overflowing the pending buffer means the gateway accepted more
	/// requests in one poll cycle than the system is provisioned for,
	/// which is an invariant breach.
	pub fn push(&mut self, rx_time_ns: u64, request: MEClientRequest) {
		assert!(
			self.pending.len() < MAX_PENDING_REQUESTS,
			"fifo sequencer overflow: more than {} requests in one poll cycle",
			MAX_PENDING_REQUESTS
		);
		self.pending.push(TimedRequest {
			rx_time_ns,
			request,
		});
	}

	/// Release the cycle's requests to the matching engine in receive
	/// order. Called once at the end of every gateway poll cycle.
	pub fn flush(&mut self) {
		if self.pending.is_empty() {
			return;
		}

		// Stable sort: equal timestamps keep insertion order.
		self.pending.sort_by_key(|timed| timed.rx_time_ns);

		for timed in self.pending.drain(..) {
			debug!(rx_time_ns = timed.rx_time_ns, request = %timed.request, "sequencing");
			self.to_engine.push(timed.request);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crucible_sdk::spsc::{RingConsumer, SpscRing};
	use crucible_sdk::types::Side;

	fn request(client_id: u32, order_id: u64) -> MEClientRequest {
		MEClientRequest::new_order(client_id, 1, order_id, Side::Buy, 100, 1)
	}

	fn drain(consumer: &mut RingConsumer<MEClientRequest>) -> Vec<(u32, u64)> {
		let mut out = Vec::new();
		while let Some(req) = consumer.pop() {
			out.push((req.client_id, req.order_id));
		}
		out
	}

	#[test]
	fn test_requests_release_in_receive_order() {
		let (producer, mut consumer) = SpscRing::with_capacity(64);
		let mut sequencer = FifoSequencer::new(producer);

		// Socket A drained first but its request arrived later.
		sequencer.push(105, request(1, 11));
		sequencer.push(100, request(2, 22));
		sequencer.flush();

		assert_eq!(drain(&mut consumer), vec![(2, 22), (1, 11)]);
	}

	#[test]
	fn test_equal_timestamps_keep_insertion_order() {
		let (producer, mut consumer) = SpscRing::with_capacity(64);
		let mut sequencer = FifoSequencer::new(producer);

		sequencer.push(100, request(1, 1));
		sequencer.push(100, request(2, 2));
		sequencer.push(100, request(3, 3));
		sequencer.flush();

		assert_eq!(drain(&mut consumer), vec![(1, 1), (2, 2), (3, 3)]);
	}

	#[test]
	fn test_flush_does_not_reorder_across_cycles() {
		let (producer, mut consumer) = SpscRing::with_capacity(64);
		let mut sequencer = FifoSequencer::new(producer);

		sequencer.push(200, request(1, 1));
		sequencer.flush();
		// A later cycle may carry an earlier timestamp; it still comes
		// out after the previous cycle's requests.
		sequencer.push(150, request(2, 2));
		sequencer.flush();

		assert_eq!(drain(&mut consumer), vec![(1, 1), (2, 2)]);
	}

	#[test]
	fn test_empty_flush_is_a_no_op() {
		let (producer, mut consumer) = SpscRing::with_capacity(4);
		let mut sequencer = FifoSequencer::new(producer);
		sequencer.flush();
		assert!(drain(&mut consumer).is_empty());
	}
}
