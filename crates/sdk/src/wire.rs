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

//! Binary wire formats for the order-entry and market-data paths.
//!
//! Every record is a `#[repr(C, packed)]` struct with a fixed field order
//! and no padding, cast to and from bytes with `zerocopy`. The sequenced
//! wrappers (`OMClientRequest`, `OMClientResponse`, `MDPMarketUpdate`) are
//! the exact frames that travel on the TCP order-entry connection and the
//! two multicast streams; the inner records are what the matching engine
//! reads and writes on its rings.
//!
//! Type tags travel as raw bytes (`kind: u8`, `side: i8`) so the structs
//! stay `FromBytes`; the typed enums are recovered with `from_wire`-style
//! decoders that map unknown values to the `Invalid` sentinel.

use std::fmt;
use std::mem;

use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::types::{
	client_id_to_string, order_id_to_string, price_to_string, priority_to_string, qty_to_string,
	ticker_id_to_string, ClientId, OrderId, Price, Priority, Qty, Side, TickerId,
	CLIENT_ID_INVALID, ORDER_ID_INVALID, PRICE_INVALID, PRIORITY_INVALID, QTY_INVALID,
	TICKER_ID_INVALID,
};

/// What a client asks the exchange to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClientRequestType {
	Invalid = 0,
	New = 1,
	Cancel = 2,
}

impl ClientRequestType {
	pub fn from_wire(raw: u8) -> Self {
		match raw {
			1 => ClientRequestType::New,
			2 => ClientRequestType::Cancel,
			_ => ClientRequestType::Invalid,
		}
	}
}

impl fmt::Display for ClientRequestType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ClientRequestType::New => write!(f, "NEW"),
			ClientRequestType::Cancel => write!(f, "CANCEL"),
			ClientRequestType::Invalid => write!(f, "INVALID"),
		}
	}
}

/// What the exchange tells a client about one of its orders.
///
/// `Rejected` covers admission failures on new orders (duplicate live
/// client order id, sentinel-valued fields, unknown instrument); the
/// matching engine answers those in-band instead of treating them as
/// internal invariant breaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClientResponseType {
	Invalid = 0,
	Accepted = 1,
	Canceled = 2,
	Filled = 3,
	CancelRejected = 4,
	Rejected = 5,
}

impl ClientResponseType {
	pub fn from_wire(raw: u8) -> Self {
		match raw {
			1 => ClientResponseType::Accepted,
			2 => ClientResponseType::Canceled,
			3 => ClientResponseType::Filled,
			4 => ClientResponseType::CancelRejected,
			5 => ClientResponseType::Rejected,
			_ => ClientResponseType::Invalid,
		}
	}
}

impl fmt::Display for ClientResponseType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ClientResponseType::Accepted => write!(f, "ACCEPTED"),
			ClientResponseType::Canceled => write!(f, "CANCELED"),
			ClientResponseType::Filled => write!(f, "FILLED"),
			ClientResponseType::CancelRejected => write!(f, "CANCEL_REJECTED"),
			ClientResponseType::Rejected => write!(f, "REJECTED"),
			ClientResponseType::Invalid => write!(f, "INVALID"),
		}
	}
}

/// Kind of an incremental or snapshot market-data record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MarketUpdateType {
	Invalid = 0,
	Clear = 1,
	Add = 2,
	Modify = 3,
	Cancel = 4,
	Trade = 5,
	SnapshotStart = 6,
	SnapshotEnd = 7,
}

impl MarketUpdateType {
	pub fn from_wire(raw: u8) -> Self {
		match raw {
			1 => MarketUpdateType::Clear,
			2 => MarketUpdateType::Add,
			3 => MarketUpdateType::Modify,
			4 => MarketUpdateType::Cancel,
			5 => MarketUpdateType::Trade,
			6 => MarketUpdateType::SnapshotStart,
			7 => MarketUpdateType::SnapshotEnd,
			_ => MarketUpdateType::Invalid,
		}
	}
}

impl fmt::Display for MarketUpdateType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			MarketUpdateType::Clear => write!(f, "CLEAR"),
			MarketUpdateType::Add => write!(f, "ADD"),
			MarketUpdateType::Modify => write!(f, "MODIFY"),
			MarketUpdateType::Cancel => write!(f, "CANCEL"),
			MarketUpdateType::Trade => write!(f, "TRADE"),
			MarketUpdateType::SnapshotStart => write!(f, "SNAPSHOT_START"),
			MarketUpdateType::SnapshotEnd => write!(f, "SNAPSHOT_END"),
			MarketUpdateType::Invalid => write!(f, "INVALID"),
		}
	}
}

/// A single order request as the matching engine consumes it.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct MEClientRequest {
	pub kind: u8,
	pub client_id: ClientId,
	pub ticker_id: TickerId,
	pub order_id: OrderId,
	pub side: i8,
	pub price: Price,
	pub qty: Qty,
}

impl MEClientRequest {
	pub fn new_order(
		client_id: ClientId,
		ticker_id: TickerId,
		order_id: OrderId,
		side: Side,
		price: Price,
		qty: Qty,
	) -> Self {
		Self {
			kind: ClientRequestType::New as u8,
			client_id,
			ticker_id,
			order_id,
			side: side.to_wire(),
			price,
			qty,
		}
	}

	pub fn cancel_order(client_id: ClientId, ticker_id: TickerId, order_id: OrderId) -> Self {
		Self {
			kind: ClientRequestType::Cancel as u8,
			client_id,
			ticker_id,
			order_id,
			..Self::default()
		}
	}

	pub fn request_type(&self) -> ClientRequestType {
		ClientRequestType::from_wire(self.kind)
	}

	pub fn order_side(&self) -> Side {
		Side::from_wire(self.side)
	}
}

impl Default for MEClientRequest {
	fn default() -> Self {
		Self {
			kind: ClientRequestType::Invalid as u8,
			client_id: CLIENT_ID_INVALID,
			ticker_id: TICKER_ID_INVALID,
			order_id: ORDER_ID_INVALID,
			side: Side::Invalid.to_wire(),
			price: PRICE_INVALID,
			qty: QTY_INVALID,
		}
	}
}

impl fmt::Display for MEClientRequest {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let (client_id, ticker_id, order_id) = (self.client_id, self.ticker_id, self.order_id);
		let (price, qty) = (self.price, self.qty);
		write!(
			f,
			"MEClientRequest [type:{} client:{} ticker:{} oid:{} side:{} qty:{} price:{}]",
			self.request_type(),
			client_id_to_string(client_id),
			ticker_id_to_string(ticker_id),
			order_id_to_string(order_id),
			self.order_side(),
			qty_to_string(qty),
			price_to_string(price),
		)
	}
}

/// Order request as framed on the TCP connection: the client session's
/// sequence number followed by the request itself.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct OMClientRequest {
	pub seq_num: u64,
	pub request: MEClientRequest,
}

impl Default for OMClientRequest {
	fn default() -> Self {
		Self {
			seq_num: 0,
			request: MEClientRequest::default(),
		}
	}
}

impl fmt::Display for OMClientRequest {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let seq_num = self.seq_num;
		let request = self.request;
		write!(f, "OMClientRequest [seq:{} {}]", seq_num, request)
	}
}

/// A single order response as the matching engine produces it.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct MEClientResponse {
	pub kind: u8,
	pub client_id: ClientId,
	pub ticker_id: TickerId,
	pub client_order_id: OrderId,
	pub market_order_id: OrderId,
	pub side: i8,
	pub price: Price,
	pub exec_qty: Qty,
	pub leaves_qty: Qty,
}

impl MEClientResponse {
	pub fn response_type(&self) -> ClientResponseType {
		ClientResponseType::from_wire(self.kind)
	}

	pub fn order_side(&self) -> Side {
		Side::from_wire(self.side)
	}
}

impl Default for MEClientResponse {
	fn default() -> Self {
		Self {
			kind: ClientResponseType::Invalid as u8,
			client_id: CLIENT_ID_INVALID,
			ticker_id: TICKER_ID_INVALID,
			client_order_id: ORDER_ID_INVALID,
			market_order_id: ORDER_ID_INVALID,
			side: Side::Invalid.to_wire(),
			price: PRICE_INVALID,
			exec_qty: QTY_INVALID,
			leaves_qty: QTY_INVALID,
		}
	}
}

impl fmt::Display for MEClientResponse {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let (client_id, ticker_id) = (self.client_id, self.ticker_id);
		let (client_order_id, market_order_id) = (self.client_order_id, self.market_order_id);
		let (price, exec_qty, leaves_qty) = (self.price, self.exec_qty, self.leaves_qty);
		write!(
			f,
			"MEClientResponse [type:{} client:{} ticker:{} coid:{} moid:{} side:{} exec_qty:{} leaves_qty:{} price:{}]",
			self.response_type(),
			client_id_to_string(client_id),
			ticker_id_to_string(ticker_id),
			order_id_to_string(client_order_id),
			order_id_to_string(market_order_id),
			self.order_side(),
			qty_to_string(exec_qty),
			qty_to_string(leaves_qty),
			price_to_string(price),
		)
	}
}

/// Order response as framed on the TCP connection.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct OMClientResponse {
	pub seq_num: u64,
	pub response: MEClientResponse,
}

impl Default for OMClientResponse {
	fn default() -> Self {
		Self {
			seq_num: 0,
			response: MEClientResponse::default(),
		}
	}
}

impl fmt::Display for OMClientResponse {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let seq_num = self.seq_num;
		let response = self.response;
		write!(f, "OMClientResponse [seq:{} {}]", seq_num, response)
	}
}

/// A single market-data event as the matching engine produces it.
///
/// `SnapshotStart` and `SnapshotEnd` records overload `order_id` to carry
/// the incremental sequence number the snapshot was synthesized at; that
/// anchor is what consumers use to splice buffered incrementals onto a
/// recovered snapshot.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct MEMarketUpdate {
	pub kind: u8,
	pub order_id: OrderId,
	pub ticker_id: TickerId,
	pub side: i8,
	pub price: Price,
	pub qty: Qty,
	pub priority: Priority,
}

impl MEMarketUpdate {
	pub fn update_type(&self) -> MarketUpdateType {
		MarketUpdateType::from_wire(self.kind)
	}

	pub fn order_side(&self) -> Side {
		Side::from_wire(self.side)
	}

	/// Start-of-cycle marker carrying the snapshot's incremental anchor.
	pub fn snapshot_start(last_inc_seq: u64) -> Self {
		Self {
			kind: MarketUpdateType::SnapshotStart as u8,
			order_id: last_inc_seq,
			..Self::default()
		}
	}

	/// End-of-cycle marker carrying the same anchor as the start marker.
	pub fn snapshot_end(last_inc_seq: u64) -> Self {
		Self {
			kind: MarketUpdateType::SnapshotEnd as u8,
			order_id: last_inc_seq,
			..Self::default()
		}
	}

	/// Instructs snapshot consumers to drop all state for one instrument.
	pub fn clear(ticker_id: TickerId) -> Self {
		Self {
			kind: MarketUpdateType::Clear as u8,
			ticker_id,
			..Self::default()
		}
	}
}

impl Default for MEMarketUpdate {
	fn default() -> Self {
		Self {
			kind: MarketUpdateType::Invalid as u8,
			order_id: ORDER_ID_INVALID,
			ticker_id: TICKER_ID_INVALID,
			side: Side::Invalid.to_wire(),
			price: PRICE_INVALID,
			qty: QTY_INVALID,
			priority: PRIORITY_INVALID,
		}
	}
}

impl fmt::Display for MEMarketUpdate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let (order_id, ticker_id) = (self.order_id, self.ticker_id);
		let (price, qty, priority) = (self.price, self.qty, self.priority);
		write!(
			f,
			"MEMarketUpdate [type:{} ticker:{} oid:{} side:{} qty:{} price:{} priority:{}]",
			self.update_type(),
			ticker_id_to_string(ticker_id),
			order_id_to_string(order_id),
			self.order_side(),
			qty_to_string(qty),
			price_to_string(price),
			priority_to_string(priority),
		)
	}
}

/// Market-data event as framed on the multicast streams: the stream
/// sequence number followed by the event. On the incremental stream the
/// sequence is global and strictly monotonic from 1; on the snapshot
/// stream it is cycle-local and restarts at 0.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct MDPMarketUpdate {
	pub seq_num: u64,
	pub update: MEMarketUpdate,
}

impl Default for MDPMarketUpdate {
	fn default() -> Self {
		Self {
			seq_num: 0,
			update: MEMarketUpdate::default(),
		}
	}
}

impl fmt::Display for MDPMarketUpdate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let seq_num = self.seq_num;
		let update = self.update;
		write!(f, "MDPMarketUpdate [seq:{} {}]", seq_num, update)
	}
}

/// Frame sizes used by the TCP and multicast framing layers.
pub const OM_CLIENT_REQUEST_SIZE: usize = mem::size_of::<OMClientRequest>();
pub const OM_CLIENT_RESPONSE_SIZE: usize = mem::size_of::<OMClientResponse>();
pub const MDP_MARKET_UPDATE_SIZE: usize = mem::size_of::<MDPMarketUpdate>();

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::{Side, PRICE_INVALID};

	#[test]
	fn test_records_are_packed() {
		// Field widths summed by hand; any padding would break the wire
		// compatibility of the framing layers.
		assert_eq!(mem::size_of::<MEClientRequest>(), 30);
		assert_eq!(OM_CLIENT_REQUEST_SIZE, 38);
		assert_eq!(mem::size_of::<MEClientResponse>(), 42);
		assert_eq!(OM_CLIENT_RESPONSE_SIZE, 50);
		assert_eq!(mem::size_of::<MEMarketUpdate>(), 34);
		assert_eq!(MDP_MARKET_UPDATE_SIZE, 42);
	}

	#[test]
	fn test_request_byte_roundtrip() {
		let request = MEClientRequest::new_order(7, 2, 91, Side::Buy, 100, 25);
		let framed = OMClientRequest {
			seq_num: 3,
			request,
		};

		let bytes = framed.as_bytes().to_vec();
		assert_eq!(bytes.len(), OM_CLIENT_REQUEST_SIZE);

		let decoded = OMClientRequest::read_from(bytes.as_slice()).unwrap();
		assert_eq!(decoded, framed);
		assert_eq!(decoded.request.request_type(), ClientRequestType::New);
		assert_eq!(decoded.request.order_side(), Side::Buy);
	}

	#[test]
	fn test_market_update_defaults_to_sentinels() {
		let update = MEMarketUpdate::default();
		assert_eq!(update.update_type(), MarketUpdateType::Invalid);
		let price = update.price;
		assert_eq!(price, PRICE_INVALID);
	}

	#[test]
	fn test_snapshot_markers_carry_anchor() {
		let start = MEMarketUpdate::snapshot_start(80);
		let end = MEMarketUpdate::snapshot_end(80);
		let (start_anchor, end_anchor) = (start.order_id, end.order_id);
		assert_eq!(start_anchor, 80);
		assert_eq!(end_anchor, 80);
		assert_eq!(start.update_type(), MarketUpdateType::SnapshotStart);
		assert_eq!(end.update_type(), MarketUpdateType::SnapshotEnd);
	}

	#[test]
	fn test_unknown_wire_bytes_decode_to_invalid() {
		assert_eq!(ClientRequestType::from_wire(99), ClientRequestType::Invalid);
		assert_eq!(
			ClientResponseType::from_wire(99),
			ClientResponseType::Invalid
		);
		assert_eq!(MarketUpdateType::from_wire(99), MarketUpdateType::Invalid);
	}
}
