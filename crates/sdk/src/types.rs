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

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of trading instruments the exchange supports.
pub const MAX_TICKERS: usize = 8;

/// Maximum number of simultaneous market participants.
pub const MAX_CLIENTS: usize = 256;

/// Maximum number of order ids a single instrument can issue.
pub const MAX_ORDER_IDS_PER_TICKER: usize = 1 << 20;

/// Maximum depth of the direct-indexed price-level table per book side.
pub const MAX_PRICE_LEVELS: usize = 256;

/// Capacity of the client-response ring between the matching engine and
/// the order gateway.
pub const MAX_CLIENT_UPDATES: usize = 1 << 18;

/// Capacity of the market-update rings between the matching engine, the
/// market data publisher and the snapshot synthesizer.
pub const MAX_MARKET_UPDATES: usize = 1 << 18;

/// Maximum number of client requests the FIFO sequencer may buffer within
/// a single gateway poll cycle.
pub const MAX_PENDING_REQUESTS: usize = 1 << 10;

/// Identifies a single order. The all-ones value is the invalid sentinel.
pub type OrderId = u64;
pub const ORDER_ID_INVALID: OrderId = OrderId::MAX;

/// Identifies a trading instrument.
pub type TickerId = u32;
pub const TICKER_ID_INVALID: TickerId = TickerId::MAX;

/// Identifies a market participant.
pub type ClientId = u32;
pub const CLIENT_ID_INVALID: ClientId = ClientId::MAX;

/// Limit price in integer ticks.
pub type Price = i64;
pub const PRICE_INVALID: Price = Price::MAX;

/// Order quantity.
pub type Qty = u32;
pub const QTY_INVALID: Qty = Qty::MAX;

/// Position of an order in the FIFO queue of its price level. Priorities
/// within a level are strictly increasing in insertion order.
pub type Priority = u64;
pub const PRIORITY_INVALID: Priority = Priority::MAX;

/// Side of an order or book.
///
/// The discriminants are part of the wire format: `side` fields travel as
/// a single signed byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum Side {
	Invalid = 0,
	Buy = 1,
	Sell = -1,
}

impl Side {
	/// Decode a wire byte; anything out of range maps to `Invalid`.
	pub fn from_wire(raw: i8) -> Self {
		match raw {
			1 => Side::Buy,
			-1 => Side::Sell,
			_ => Side::Invalid,
		}
	}

	pub fn to_wire(self) -> i8 {
		self as i8
	}

	pub fn opposite(self) -> Self {
		match self {
			Side::Buy => Side::Sell,
			Side::Sell => Side::Buy,
			Side::Invalid => Side::Invalid,
		}
	}
}

impl fmt::Display for Side {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Side::Buy => write!(f, "BUY"),
			Side::Sell => write!(f, "SELL"),
			Side::Invalid => write!(f, "INVALID"),
		}
	}
}

/// Best bid and offer: the highest live buy price and lowest live sell
/// price, each with the quantity aggregated across the level's FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bbo {
	pub bid_price: Price,
	pub bid_qty: Qty,
	pub ask_price: Price,
	pub ask_qty: Qty,
}

impl Default for Bbo {
	fn default() -> Self {
		Self {
			bid_price: PRICE_INVALID,
			bid_qty: QTY_INVALID,
			ask_price: PRICE_INVALID,
			ask_qty: QTY_INVALID,
		}
	}
}

impl fmt::Display for Bbo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}@{} x {}@{}",
			qty_to_string(self.bid_qty),
			price_to_string(self.bid_price),
			qty_to_string(self.ask_qty),
			price_to_string(self.ask_price),
		)
	}
}

pub fn order_id_to_string(order_id: OrderId) -> String {
	if order_id == ORDER_ID_INVALID {
		"INVALID".to_string()
	} else {
		order_id.to_string()
	}
}

pub fn ticker_id_to_string(ticker_id: TickerId) -> String {
	if ticker_id == TICKER_ID_INVALID {
		"INVALID".to_string()
	} else {
		ticker_id.to_string()
	}
}

pub fn client_id_to_string(client_id: ClientId) -> String {
	if client_id == CLIENT_ID_INVALID {
		"INVALID".to_string()
	} else {
		client_id.to_string()
	}
}

pub fn price_to_string(price: Price) -> String {
	if price == PRICE_INVALID {
		"INVALID".to_string()
	} else {
		price.to_string()
	}
}

pub fn qty_to_string(qty: Qty) -> String {
	if qty == QTY_INVALID {
		"INVALID".to_string()
	} else {
		qty.to_string()
	}
}

pub fn priority_to_string(priority: Priority) -> String {
	if priority == PRIORITY_INVALID {
		"INVALID".to_string()
	} else {
		priority.to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_side_wire_roundtrip() {
		assert_eq!(Side::from_wire(Side::Buy.to_wire()), Side::Buy);
		assert_eq!(Side::from_wire(Side::Sell.to_wire()), Side::Sell);
		assert_eq!(Side::from_wire(0), Side::Invalid);
		assert_eq!(Side::from_wire(42), Side::Invalid);
	}

	#[test]
	fn test_sentinel_display() {
		assert_eq!(order_id_to_string(ORDER_ID_INVALID), "INVALID");
		assert_eq!(order_id_to_string(17), "17");
		assert_eq!(price_to_string(PRICE_INVALID), "INVALID");
		assert_eq!(price_to_string(-5), "-5");
	}

	#[test]
	fn test_bbo_default_is_empty() {
		let bbo = Bbo::default();
		assert_eq!(bbo.bid_price, PRICE_INVALID);
		assert_eq!(bbo.ask_price, PRICE_INVALID);
		assert_eq!(format!("{}", bbo), "INVALID@INVALID x INVALID@INVALID");
	}
}
