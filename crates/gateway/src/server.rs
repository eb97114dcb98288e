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

use std::net::SocketAddr;
use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc,
};
use std::thread::{self, JoinHandle};

use tracing::{error, info, warn};
use zerocopy::{AsBytes, FromBytes};

use crucible_sdk::net::TcpServer;
use crucible_sdk::spsc::{RingConsumer, RingProducer};
use crucible_sdk::wire::{
	MEClientRequest, MEClientResponse, OMClientRequest, OMClientResponse, OM_CLIENT_REQUEST_SIZE,
};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::sequencer::FifoSequencer;
use crate::session::ClientSessions;

/// Exchange-side order gateway.
///
/// One dedicated thread accepts client connections, validates every
/// framed request against the per-client session state, feeds survivors
/// to the FIFO sequencer and flushes the sequencer at the end of each
/// poll cycle. The same loop drains the matching engine's response ring
/// and sends each response, stamped with the client's outgoing sequence
/// number, on the connection that owns the client.
pub struct OrderServer {
	thread_handle: Option<JoinHandle<()>>,
	running: Arc<AtomicBool>,
	local_addr: SocketAddr,
}

impl OrderServer {
	/// Bind the listening socket and spawn the gateway thread.
	pub fn start(
		config: GatewayConfig,
		to_engine: RingProducer<MEClientRequest>,
		from_engine: RingConsumer<MEClientResponse>,
	) -> Result<Self, GatewayError> {
		// Bind on the caller's thread so startup errors surface here.
		let tcp = TcpServer::bind(config.bind_addr, OM_CLIENT_REQUEST_SIZE)?;
		let local_addr = tcp.local_addr()?;

		let running = Arc::new(AtomicBool::new(true));
		let running_clone = running.clone();

		let thread_handle = thread::Builder::new()
			.name("order-gateway".to_string())
			.spawn(move || {
				if let Some(core_id) = config.core_id {
					pin_to_core(core_id);
				}
				info!("order gateway started");
				run_gateway_loop(tcp, to_engine, from_engine, &running_clone);
				info!("order gateway stopped");
			})
			.expect("Failed to spawn order gateway thread");

		Ok(Self {
			thread_handle: Some(thread_handle),
			running,
			local_addr,
		})
	}

	/// Address the gateway is listening on; useful when the configured
	/// port was 0.
	pub fn local_addr(&self) -> SocketAddr {
		self.local_addr
	}

	pub fn shutdown(mut self) {
		info!("shutting down order gateway");
		self.running.store(false, Ordering::Release);
		if let Some(handle) = self.thread_handle.take() {
			if let Err(e) = handle.join() {
				warn!(error = ?e, "order gateway thread panicked");
			}
		}
	}
}

impl Drop for OrderServer {
	fn drop(&mut self) {
		self.running.store(false, Ordering::Release);
		if let Some(handle) = self.thread_handle.take() {
			let _ = handle.join();
		}
	}
}

fn run_gateway_loop(
	mut tcp: TcpServer,
	to_engine: RingProducer<MEClientRequest>,
	mut from_engine: RingConsumer<MEClientResponse>,
	running: &Arc<AtomicBool>,
) {
	let mut sessions = ClientSessions::new();
	let mut sequencer = FifoSequencer::new(to_engine);

	while running.load(Ordering::Acquire) {
		tcp.poll(&mut |conn_id, frame, rx_time| {
			let framed = match OMClientRequest::read_from(frame) {
				Some(framed) => framed,
				None => {
					// The framing layer hands out exact-size frames, so
					// this cannot happen unless the wire layout changed
					// under us.
					error!(conn_id, len = frame.len(), "unreadable request frame");
					return;
				}
			};

			if let Some(request) = sessions.admit(conn_id, &framed) {
				sequencer.push(rx_time, request);
			}
		});

		// End of the poll cycle: release this batch in receive order.
		sequencer.flush();

		while let Some(response) = from_engine.pop() {
			let client_id = response.client_id;
			let conn_id = match sessions.connection(client_id) {
				Some(conn_id) => conn_id,
				None => {
					// The matching engine only answers requests the
					// gateway admitted, so an unbound client cannot
					// happen.
					error!(client_id, %response, "no connection bound for client");
					panic!("response for a client no connection has claimed");
				}
			};

			let framed = OMClientResponse {
				seq_num: sessions.next_outgoing(client_id),
				response,
			};
			if !tcp.send(conn_id, framed.as_bytes()) {
				warn!(client_id, conn_id, "dropping response for a dead connection");
			}
		}

		tcp.pump();
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
		info!(core_id, "order gateway pinned");
	} else {
		warn!(core_id, "could not pin order gateway to requested core");
	}
}
