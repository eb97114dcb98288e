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
use zerocopy::{AsBytes, FromBytes};

use crucible_sdk::net::TcpClient;
use crucible_sdk::spsc::{RingConsumer, RingProducer};
use crucible_sdk::wire::{
	MEClientRequest, MEClientResponse, OMClientRequest, OMClientResponse,
	OM_CLIENT_RESPONSE_SIZE,
};

use crate::config::ClientGatewayConfig;
use crate::error::GatewayError;

/// Trading-side order gateway.
///
/// Bridges the trading engine to the exchange: requests drained from the
/// engine's ring go out stamped with this session's outgoing sequence
/// number; responses read off the socket are checked for the session's
/// client id and expected sequence number and forwarded to the engine's
/// response ring. Mismatches on the reliable TCP path indicate a bug on
/// one end or the other and are logged and dropped.
pub struct OrderGatewayClient {
	thread_handle: Option<JoinHandle<()>>,
	running: Arc<AtomicBool>,
}

impl OrderGatewayClient {
	pub fn start(
		config: ClientGatewayConfig,
		requests: RingConsumer<MEClientRequest>,
		responses: RingProducer<MEClientResponse>,
	) -> Result<Self, GatewayError> {
		// Connect on the caller's thread so a refused connection
		// surfaces as an error instead of a dead worker.
		let tcp = TcpClient::connect(config.server_addr, OM_CLIENT_RESPONSE_SIZE)?;

		let running = Arc::new(AtomicBool::new(true));
		let running_clone = running.clone();

		let thread_handle = thread::Builder::new()
			.name(format!("order-gateway-client-{}", config.client_id))
			.spawn(move || {
				info!(client_id = config.client_id, "order gateway client started");
				run_client_loop(&config, tcp, requests, responses, &running_clone);
				info!(client_id = config.client_id, "order gateway client stopped");
			})
			.expect("Failed to spawn order gateway client thread");

		Ok(Self {
			thread_handle: Some(thread_handle),
			running,
		})
	}

	pub fn shutdown(mut self) {
		info!("shutting down order gateway client");
		self.running.store(false, Ordering::Release);
		if let Some(handle) = self.thread_handle.take() {
			if let Err(e) = handle.join() {
				warn!(error = ?e, "order gateway client thread panicked");
			}
		}
	}
}

impl Drop for OrderGatewayClient {
	fn drop(&mut self) {
		self.running.store(false, Ordering::Release);
		if let Some(handle) = self.thread_handle.take() {
			let _ = handle.join();
		}
	}
}

fn run_client_loop(
	config: &ClientGatewayConfig,
	mut tcp: TcpClient,
	mut requests: RingConsumer<MEClientRequest>,
	mut responses: RingProducer<MEClientResponse>,
	running: &Arc<AtomicBool>,
) {
	let client_id = config.client_id;
	let mut next_outgoing_seq: u64 = 1;
	let mut next_expected_seq: u64 = 1;

	while running.load(Ordering::Acquire) {
		while let Some(request) = requests.pop() {
			let framed = OMClientRequest {
				seq_num: next_outgoing_seq,
				request,
			};
			tcp.send(framed.as_bytes());
			next_outgoing_seq += 1;
		}

		tcp.send_and_recv(&mut |frame, _rx_time| {
			let framed = match OMClientResponse::read_from(frame) {
				Some(framed) => framed,
				None => {
					error!(len = frame.len(), "unreadable response frame");
					return;
				}
			};
			let response = framed.response;

			let response_client_id = response.client_id;
			if response_client_id != client_id {
				// Should never happen unless there is a bug at the
				// exchange.
				error!(
					expected = client_id,
					received = response_client_id,
					"response for a different client"
				);
				return;
			}
			let seq_num = framed.seq_num;
			if seq_num != next_expected_seq {
				error!(
					client_id,
					expected = next_expected_seq,
					received = seq_num,
					"response sequence number mismatch"
				);
				return;
			}
			next_expected_seq += 1;

			responses.push(response);
		});

		if !tcp.is_connected() {
			warn!(client_id, "order server connection lost");
			break;
		}
	}
}
