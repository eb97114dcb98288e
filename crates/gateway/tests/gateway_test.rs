//! End-to-end order path test: trading-side gateway client -> TCP ->
//! order server -> FIFO sequencer -> matching engine -> TCP -> client.

use std::thread;
use std::time::{Duration, Instant};

use crucible_gateway::{ClientGatewayConfig, GatewayConfig, OrderGatewayClient, OrderServer};
use crucible_matching::{MatchingConfig, MatchingEngine};
use crucible_sdk::spsc::{RingConsumer, SpscRing};
use crucible_sdk::types::Side;
use crucible_sdk::wire::{
	ClientResponseType, MEClientRequest, MEClientResponse, MEMarketUpdate,
};

fn drain_until(
	consumer: &mut RingConsumer<MEClientResponse>,
	count: usize,
) -> Vec<MEClientResponse> {
	let deadline = Instant::now() + Duration::from_secs(10);
	let mut out = Vec::with_capacity(count);
	while out.len() < count {
		if let Some(value) = consumer.pop() {
			out.push(value);
		} else if Instant::now() > deadline {
			panic!("timed out waiting for {} responses, got {}", count, out.len());
		} else {
			thread::sleep(Duration::from_millis(1));
		}
	}
	out
}

#[test]
fn test_order_round_trip_over_tcp() {
	// Exchange side.
	let (req_tx, req_rx) = SpscRing::<MEClientRequest>::with_capacity(1024);
	let (resp_tx, resp_rx) = SpscRing::<MEClientResponse>::with_capacity(1024);
	let (upd_tx, _upd_rx) = SpscRing::<MEMarketUpdate>::with_capacity(1024);

	let engine = MatchingEngine::start(MatchingConfig::default(), req_rx, resp_tx, upd_tx);

	let server_config = GatewayConfig {
		bind_addr: "127.0.0.1:0".parse().unwrap(),
		core_id: None,
	};
	let server = OrderServer::start(server_config, req_tx, resp_rx).unwrap();
	let server_addr = server.local_addr();

	// Trading side.
	let (mut order_tx, order_rx) = SpscRing::<MEClientRequest>::with_capacity(256);
	let (fill_tx, mut fill_rx) = SpscRing::<MEClientResponse>::with_capacity(256);

	let client_config = ClientGatewayConfig {
		server_addr,
		client_id: 7,
	};
	let client = OrderGatewayClient::start(client_config, order_rx, fill_tx).unwrap();

	// A resting buy, then a crossing sell from the same participant.
	order_tx.push(MEClientRequest::new_order(7, 1, 1, Side::Buy, 100, 10));

	let responses = drain_until(&mut fill_rx, 1);
	assert_eq!(responses[0].response_type(), ClientResponseType::Accepted);
	let (coid, leaves) = (responses[0].client_order_id, responses[0].leaves_qty);
	assert_eq!((coid, leaves), (1, 10));

	order_tx.push(MEClientRequest::new_order(7, 1, 2, Side::Sell, 100, 4));

	let responses = drain_until(&mut fill_rx, 2);
	for response in &responses {
		assert_eq!(response.response_type(), ClientResponseType::Filled);
		let client_id = response.client_id;
		assert_eq!(client_id, 7);
	}
	// Aggressor fill first, then the resting side of the self-cross.
	let (coid, exec, leaves) = (
		responses[0].client_order_id,
		responses[0].exec_qty,
		responses[0].leaves_qty,
	);
	assert_eq!((coid, exec, leaves), (2, 4, 0));
	let (coid, exec, leaves) = (
		responses[1].client_order_id,
		responses[1].exec_qty,
		responses[1].leaves_qty,
	);
	assert_eq!((coid, exec, leaves), (1, 4, 6));

	client.shutdown();
	server.shutdown();
	engine.shutdown();
}

#[test]
fn test_cancel_round_trip_over_tcp() {
	let (req_tx, req_rx) = SpscRing::<MEClientRequest>::with_capacity(1024);
	let (resp_tx, resp_rx) = SpscRing::<MEClientResponse>::with_capacity(1024);
	let (upd_tx, _upd_rx) = SpscRing::<MEMarketUpdate>::with_capacity(1024);

	let engine = MatchingEngine::start(MatchingConfig::default(), req_rx, resp_tx, upd_tx);

	let server_config = GatewayConfig {
		bind_addr: "127.0.0.1:0".parse().unwrap(),
		core_id: None,
	};
	let server = OrderServer::start(server_config, req_tx, resp_rx).unwrap();
	let server_addr = server.local_addr();

	let (mut order_tx, order_rx) = SpscRing::<MEClientRequest>::with_capacity(256);
	let (fill_tx, mut fill_rx) = SpscRing::<MEClientResponse>::with_capacity(256);

	let client_config = ClientGatewayConfig {
		server_addr,
		client_id: 3,
	};
	let client = OrderGatewayClient::start(client_config, order_rx, fill_tx).unwrap();

	order_tx.push(MEClientRequest::new_order(3, 0, 5, Side::Sell, 105, 2));
	order_tx.push(MEClientRequest::cancel_order(3, 0, 5));
	order_tx.push(MEClientRequest::cancel_order(3, 0, 99)); // unknown id

	let responses = drain_until(&mut fill_rx, 3);
	assert_eq!(responses[0].response_type(), ClientResponseType::Accepted);
	assert_eq!(responses[1].response_type(), ClientResponseType::Canceled);
	assert_eq!(
		responses[2].response_type(),
		ClientResponseType::CancelRejected
	);

	client.shutdown();
	server.shutdown();
	engine.shutdown();
}
