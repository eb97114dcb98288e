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

use tracing::warn;

use crucible_sdk::net::ConnId;
use crucible_sdk::types::{ClientId, MAX_CLIENTS};
use crucible_sdk::wire::{MEClientRequest, OMClientRequest};

/// Per-client protocol state on the exchange side of the order path.
///
/// Each client owns two sequence-number streams, both starting at 1: the
/// numbers it stamps on requests and the numbers the gateway stamps on
/// responses. A client is claimed by the first connection that speaks for
/// it; requests for that client arriving on any other connection are
/// protocol breaches and are dropped.
///
/// Sequence gaps on the reliable TCP path are protocol breaches too: the
/// offending record is logged and dropped and the expected counter does
/// not advance, so a client that skips a number can re-enter the stream
/// by sending the number the gateway still expects.
pub struct ClientSessions {
	next_exp_seq: Vec<u64>,
	next_out_seq: Vec<u64>,
	conn_of_client: Vec<Option<ConnId>>,
}

impl ClientSessions {
	pub fn new() -> Self {
		Self {
			next_exp_seq: vec![1; MAX_CLIENTS],
			next_out_seq: vec![1; MAX_CLIENTS],
			conn_of_client: vec![None; MAX_CLIENTS],
		}
	}

	/// Validate one framed request read from `conn_id` and, if it passes
	/// binding and sequencing, hand back the inner request.
	pub fn admit(&mut self, conn_id: ConnId, framed: &OMClientRequest) -> Option<MEClientRequest> {
		let request = framed.request;
		let client_id = request.client_id;
		if client_id as usize >= MAX_CLIENTS {
			warn!(client_id, "dropping request with out-of-range client id");
			return None;
		}
		let slot = client_id as usize;

		match self.conn_of_client[slot] {
			None => self.conn_of_client[slot] = Some(conn_id),
			Some(bound) if bound != conn_id => {
				warn!(
					client_id,
					bound_conn = bound,
					got_conn = conn_id,
					"dropping request from a connection that does not own the client"
				);
				return None;
			}
			Some(_) => {}
		}

		let seq_num = framed.seq_num;
		let expected = self.next_exp_seq[slot];
		if seq_num != expected {
			warn!(
				client_id,
				expected,
				received = seq_num,
				"dropping request with incorrect sequence number"
			);
			return None;
		}
		self.next_exp_seq[slot] += 1;

		Some(request)
	}

	/// Connection that owns `client_id`, if any has claimed it yet.
	pub fn connection(&self, client_id: ClientId) -> Option<ConnId> {
		self.conn_of_client.get(client_id as usize).copied().flatten()
	}

	/// Sequence number to stamp on the next outbound response for
	/// `client_id`; advances the counter.
	pub fn next_outgoing(&mut self, client_id: ClientId) -> u64 {
		let seq = self.next_out_seq[client_id as usize];
		self.next_out_seq[client_id as usize] += 1;
		seq
	}
}

impl Default for ClientSessions {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crucible_sdk::types::Side;

	fn framed(client_id: u32, seq_num: u64) -> OMClientRequest {
		OMClientRequest {
			seq_num,
			request: MEClientRequest::new_order(client_id, 1, seq_num, Side::Buy, 100, 1),
		}
	}

	#[test]
	fn test_sequence_gap_drops_without_advancing() {
		let mut sessions = ClientSessions::new();

		assert!(sessions.admit(0, &framed(7, 1)).is_some());
		assert!(sessions.admit(0, &framed(7, 2)).is_some());
		// Gap: 4 while 3 is expected. Dropped, counter unchanged.
		assert!(sessions.admit(0, &framed(7, 4)).is_none());
		// 3 is still what the gateway expects, so it is accepted.
		assert!(sessions.admit(0, &framed(7, 3)).is_some());
		assert!(sessions.admit(0, &framed(7, 4)).is_some());
	}

	#[test]
	fn test_client_is_claimed_by_first_connection() {
		let mut sessions = ClientSessions::new();

		assert!(sessions.admit(3, &framed(9, 1)).is_some());
		assert_eq!(sessions.connection(9), Some(3));

		// Same client id on a different connection is dropped and does
		// not disturb the sequence stream.
		assert!(sessions.admit(4, &framed(9, 2)).is_none());
		assert!(sessions.admit(3, &framed(9, 2)).is_some());
	}

	#[test]
	fn test_out_of_range_client_is_dropped() {
		let mut sessions = ClientSessions::new();
		assert!(sessions.admit(0, &framed(MAX_CLIENTS as u32, 1)).is_none());
	}

	#[test]
	fn test_outgoing_sequence_numbers_start_at_one() {
		let mut sessions = ClientSessions::new();
		assert_eq!(sessions.next_outgoing(5), 1);
		assert_eq!(sessions.next_outgoing(5), 2);
		assert_eq!(sessions.next_outgoing(6), 1);
	}
}
