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

use crate::types::{Price, Side, TickerId};
use crate::wire::{MEClientResponse, MEMarketUpdate};

/// Contract between the trading engine and a strategy implementation.
///
/// The trading engine drains the market-data consumer and order-gateway
/// rings on its own thread and dispatches through this trait; strategies
/// (market maker, liquidity taker, ...) live entirely behind it and never
/// touch sockets or rings themselves.
pub trait TradeEventHandler {
	/// A price level changed on `ticker_id`.
	fn on_order_book_update(&mut self, ticker_id: TickerId, price: Price, side: Side);

	/// A trade printed on the incremental market-data stream.
	fn on_trade_update(&mut self, update: &MEMarketUpdate);

	/// The exchange responded to one of our own orders.
	fn on_order_update(&mut self, response: &MEClientResponse);
}
