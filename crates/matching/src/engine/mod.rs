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

use tracing::{debug, error, info, warn};

use crucible_sdk::spsc::{RingConsumer, RingProducer};
use crucible_sdk::types::{ORDER_ID_INVALID, MAX_TICKERS};
use crucible_sdk::wire::{
	ClientRequestType, ClientResponseType, MEClientRequest, MEClientResponse, MEMarketUpdate,
};

use crate::config::MatchingConfig;
use crate::orderbook::OrderBook;

/// Matching engine driver.
///
/// Owns one order book per instrument and a dedicated thread that drains
/// the gateway's request ring in a busy loop, dispatching each request to
/// the right book. Everything the books produce goes out on the response
/// and market-update rings before the next request is read, so downstream
/// consumers observe the effects of one request as a contiguous run.
///
/// The loop never blocks on I/O and never takes a lock; the rings are the
/// only points of contact with the rest of the process.
pub struct MatchingEngine {
	thread_handle: Option<JoinHandle<()>>,
	running: Arc<AtomicBool>,
}

impl MatchingEngine {
	/// Spawn the matching thread. The engine runs until `shutdown` (or
	/// drop) flips the running flag.
	pub fn start(
		config: MatchingConfig,
		requests: RingConsumer<MEClientRequest>,
		responses: RingProducer<MEClientResponse>,
		updates: RingProducer<MEMarketUpdate>,
	) -> Self {
		let running = Arc::new(AtomicBool::new(true));
		let running_clone = running.clone();

		let thread_handle = thread::Builder::new()
			.name("matching-engine".to_string())
			.spawn(move || {
				if let Some(core_id) = config.core_id {
					pin_to_core(core_id);
				}
				info!("matching engine started");
				run_matching_loop(&config, requests, responses, updates, &running_clone);
				info!("matching engine stopped");
			})
			.expect("Failed to spawn matching engine thread");

		Self {
			thread_handle: Some(thread_handle),
			running,
		}
	}

	pub fn shutdown(mut self) {
		info!("shutting down matching engine");
		self.running.store(false, Ordering::Release);
		if let Some(handle) = self.thread_handle.take() {
			if let Err(e) = handle.join() {
				warn!(error = ?e, "matching engine thread panicked");
			}
		}
	}
}

impl Drop for MatchingEngine {
	fn drop(&mut self) {
		self.running.store(false, Ordering::Release);
		if let Some(handle) = self.thread_handle.take() {
			let _ = handle.join();
		}
	}
}

fn run_matching_loop(
	config: &MatchingConfig,
	mut requests: RingConsumer<MEClientRequest>,
	mut responses: RingProducer<MEClientResponse>,
	mut updates: RingProducer<MEMarketUpdate>,
	running: &Arc<AtomicBool>,
) {
	let mut books: Vec<OrderBook> = (0..MAX_TICKERS as u32).map(OrderBook::new).collect();

	while running.load(Ordering::Acquire) {
		let request = match requests.pop() {
			Some(request) => request,
			None => {
				thread::yield_now();
				continue;
			}
		};

		if config.verbose_logging {
			debug!(%request, "processing");
		}

		process_request(&mut books, &request, &mut responses, &mut updates);
	}
}

fn process_request(
	books: &mut [OrderBook],
	request: &MEClientRequest,
	responses: &mut RingProducer<MEClientResponse>,
	updates: &mut RingProducer<MEMarketUpdate>,
) {
	let ticker_id = request.ticker_id;
	if ticker_id as usize >= books.len() {
		warn!(%request, "rejecting request for unknown instrument");
		responses.push(MEClientResponse {
			kind: ClientResponseType::Rejected as u8,
			client_id: request.client_id,
			ticker_id,
			client_order_id: request.order_id,
			market_order_id: ORDER_ID_INVALID,
			side: request.side,
			price: request.price,
			..MEClientResponse::default()
		});
		return;
	}
	let book = &mut books[ticker_id as usize];

	match request.request_type() {
		ClientRequestType::New => book.add(
			request.client_id,
			request.order_id,
			request.order_side(),
			request.price,
			request.qty,
			responses,
			updates,
		),
		ClientRequestType::Cancel => {
			book.cancel(request.client_id, request.order_id, responses, updates)
		}
		ClientRequestType::Invalid => {
			// The gateway never forwards anything else; seeing it here
			// means the request path is corrupt.
			error!(%request, "unhandled client request type");
			panic!("matching engine received an invalid client request type");
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
		info!(core_id, "matching engine pinned");
	} else {
		warn!(core_id, "could not pin matching engine to requested core");
	}
}
