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

use std::collections::HashMap;

use tracing::warn;

use crucible_sdk::spsc::RingProducer;
use crucible_sdk::types::{
	Bbo, ClientId, OrderId, Price, Priority, Qty, Side, TickerId, MAX_PRICE_LEVELS,
	ORDER_ID_INVALID, PRICE_INVALID, PRIORITY_INVALID, QTY_INVALID,
};
use crucible_sdk::wire::{
	ClientResponseType, MEClientResponse, MEMarketUpdate, MarketUpdateType,
};

/// Arena index sentinel. Orders and price levels live in pre-allocated
/// slot arenas and reference each other by index; `NIL` plays the role a
/// null pointer would in an intrusive list.
const NIL: u32 = u32::MAX;

/// A live order. `prev`/`next` chain all orders at the same price into a
/// circular FIFO; the node is returned to the free list on removal.
#[derive(Debug, Clone, Copy)]
struct OrderNode {
	client_id: ClientId,
	client_order_id: OrderId,
	market_order_id: OrderId,
	side: Side,
	price: Price,
	qty: Qty,
	priority: Priority,
	prev: u32,
	next: u32,
}

/// One price level. `first_order` heads the FIFO of live orders at this
/// price; `prev`/`next` chain the level into its side's circular
/// price-ordered list.
#[derive(Debug, Clone, Copy)]
struct LevelNode {
	side: Side,
	price: Price,
	first_order: u32,
	prev: u32,
	next: u32,
}

/// Price-time-priority limit order book for one instrument.
///
/// The book is single-threaded by construction: only the matching-engine
/// loop touches it. Responses and market updates produced by `add` and
/// `cancel` are written straight into the engine's outbound rings, so the
/// hot path performs no allocation beyond amortized arena growth.
///
/// Structure:
/// - Two circular doubly-linked level lists, bids descending and asks
///   ascending, so the head of each list is the top of book.
/// - A circular FIFO of orders per level; priorities strictly increase
///   along the FIFO in insertion order.
/// - A direct-indexed `price -> level` table of `MAX_PRICE_LEVELS` slots.
///   The bounded price range rules collisions out; a collision at
///   insertion is an invariant breach and terminates the process.
/// - A `(client, client_order_id) -> order` lookup used by cancels.
pub struct OrderBook {
	ticker_id: TickerId,
	orders: Vec<OrderNode>,
	free_orders: Vec<u32>,
	levels: Vec<LevelNode>,
	free_levels: Vec<u32>,
	bids_head: u32,
	asks_head: u32,
	price_table: Box<[u32]>,
	live_orders: HashMap<(ClientId, OrderId), u32>,
	next_market_order_id: OrderId,
}

impl OrderBook {
	pub fn new(ticker_id: TickerId) -> Self {
		Self {
			ticker_id,
			orders: Vec::with_capacity(1024),
			free_orders: Vec::new(),
			levels: Vec::with_capacity(MAX_PRICE_LEVELS),
			free_levels: Vec::new(),
			bids_head: NIL,
			asks_head: NIL,
			price_table: vec![NIL; MAX_PRICE_LEVELS].into_boxed_slice(),
			live_orders: HashMap::with_capacity(1024),
			next_market_order_id: 1,
		}
	}

	pub fn ticker_id(&self) -> TickerId {
		self.ticker_id
	}

	/// Admit a new limit order: match it against the opposite side and
	/// rest any residual quantity on its own side.
	///
	/// Admission failures (sentinel fields, duplicate live client order
	/// id) answer with a `Rejected` response and leave the book
	/// untouched.
	pub fn add(
		&mut self,
		client_id: ClientId,
		client_order_id: OrderId,
		side: Side,
		price: Price,
		qty: Qty,
		responses: &mut RingProducer<MEClientResponse>,
		updates: &mut RingProducer<MEMarketUpdate>,
	) {
		if side == Side::Invalid || price == PRICE_INVALID || qty == QTY_INVALID || qty == 0 {
			warn!(client_id, client_order_id, "rejecting order with invalid fields");
			self.send_reject(client_id, client_order_id, side, price, responses);
			return;
		}
		if self.live_orders.contains_key(&(client_id, client_order_id)) {
			warn!(client_id, client_order_id, "rejecting duplicate client order id");
			self.send_reject(client_id, client_order_id, side, price, responses);
			return;
		}

		let market_order_id = self.next_market_order_id;
		self.next_market_order_id += 1;

		let leaves_qty = self.match_against_book(
			client_id,
			client_order_id,
			market_order_id,
			side,
			price,
			qty,
			responses,
			updates,
		);

		if leaves_qty > 0 {
			let priority = self.insert_order(
				client_id,
				client_order_id,
				market_order_id,
				side,
				price,
				leaves_qty,
			);

			responses.push(MEClientResponse {
				kind: ClientResponseType::Accepted as u8,
				client_id,
				ticker_id: self.ticker_id,
				client_order_id,
				market_order_id,
				side: side.to_wire(),
				price,
				exec_qty: qty - leaves_qty,
				leaves_qty,
			});
			updates.push(MEMarketUpdate {
				kind: MarketUpdateType::Add as u8,
				order_id: market_order_id,
				ticker_id: self.ticker_id,
				side: side.to_wire(),
				price,
				qty: leaves_qty,
				priority,
			});
		}
	}

	/// Cancel a live order. Unknown ids (including ids owned by another
	/// client) answer with `CancelRejected` and do not mutate the book.
	pub fn cancel(
		&mut self,
		client_id: ClientId,
		client_order_id: OrderId,
		responses: &mut RingProducer<MEClientResponse>,
		updates: &mut RingProducer<MEMarketUpdate>,
	) {
		let order_idx = match self.live_orders.remove(&(client_id, client_order_id)) {
			Some(idx) => idx,
			None => {
				responses.push(MEClientResponse {
					kind: ClientResponseType::CancelRejected as u8,
					client_id,
					ticker_id: self.ticker_id,
					client_order_id,
					market_order_id: ORDER_ID_INVALID,
					..MEClientResponse::default()
				});
				return;
			}
		};

		let order = self.orders[order_idx as usize];
		self.remove_order(order_idx);

		responses.push(MEClientResponse {
			kind: ClientResponseType::Canceled as u8,
			client_id,
			ticker_id: self.ticker_id,
			client_order_id,
			market_order_id: order.market_order_id,
			side: order.side.to_wire(),
			price: order.price,
			exec_qty: QTY_INVALID,
			leaves_qty: order.qty,
		});
		updates.push(MEMarketUpdate {
			kind: MarketUpdateType::Cancel as u8,
			order_id: order.market_order_id,
			ticker_id: self.ticker_id,
			side: order.side.to_wire(),
			price: order.price,
			qty: order.qty,
			priority: order.priority,
		});
	}

	/// Best bid and offer with quantities aggregated across each top
	/// level's FIFO.
	pub fn bbo(&self) -> Bbo {
		let mut bbo = Bbo::default();
		if self.bids_head != NIL {
			let level = &self.levels[self.bids_head as usize];
			bbo.bid_price = level.price;
			bbo.bid_qty = self.level_qty(self.bids_head);
		}
		if self.asks_head != NIL {
			let level = &self.levels[self.asks_head as usize];
			bbo.ask_price = level.price;
			bbo.ask_qty = self.level_qty(self.asks_head);
		}
		bbo
	}

	/// Number of live orders (diagnostics and tests).
	pub fn live_order_count(&self) -> usize {
		self.live_orders.len()
	}

	/// Level prices from the top of book outward (diagnostics and
	/// tests): descending for bids, ascending for asks.
	pub fn level_prices(&self, side: Side) -> Vec<Price> {
		let head = match side {
			Side::Buy => self.bids_head,
			Side::Sell => self.asks_head,
			Side::Invalid => return Vec::new(),
		};
		let mut prices = Vec::new();
		if head == NIL {
			return prices;
		}
		let mut cur = head;
		loop {
			prices.push(self.levels[cur as usize].price);
			cur = self.levels[cur as usize].next;
			if cur == head {
				break;
			}
		}
		prices
	}

	/// Priorities along the FIFO of the level at `price`, head first
	/// (diagnostics and tests).
	pub fn level_priorities(&self, price: Price) -> Vec<Priority> {
		let mut priorities = Vec::new();
		let level_idx = self.price_table[Self::price_slot(price)];
		if level_idx == NIL || self.levels[level_idx as usize].price != price {
			return priorities;
		}
		let first = self.levels[level_idx as usize].first_order;
		let mut cur = first;
		loop {
			priorities.push(self.orders[cur as usize].priority);
			cur = self.orders[cur as usize].next;
			if cur == first {
				break;
			}
		}
		priorities
	}

	// ------------------------------------------------------------------
	// Matching
	// ------------------------------------------------------------------

	#[allow(clippy::too_many_arguments)]
	fn match_against_book(
		&mut self,
		client_id: ClientId,
		client_order_id: OrderId,
		market_order_id: OrderId,
		side: Side,
		price: Price,
		qty: Qty,
		responses: &mut RingProducer<MEClientResponse>,
		updates: &mut RingProducer<MEMarketUpdate>,
	) -> Qty {
		let mut leaves_qty = qty;

		while leaves_qty > 0 {
			let level_idx = match side {
				Side::Buy => self.asks_head,
				Side::Sell => self.bids_head,
				Side::Invalid => unreachable!("validated by add"),
			};
			if level_idx == NIL {
				break;
			}

			let level_price = self.levels[level_idx as usize].price;
			let crosses = match side {
				Side::Buy => level_price <= price,
				Side::Sell => level_price >= price,
				Side::Invalid => unreachable!("validated by add"),
			};
			if !crosses {
				break;
			}

			let resting_idx = self.levels[level_idx as usize].first_order;
			let resting = self.orders[resting_idx as usize];
			let fill_qty = leaves_qty.min(resting.qty);

			leaves_qty -= fill_qty;
			let resting_leaves = resting.qty - fill_qty;
			self.orders[resting_idx as usize].qty = resting_leaves;

			// Aggressors trade at the resting order's price.
			updates.push(MEMarketUpdate {
				kind: MarketUpdateType::Trade as u8,
				order_id: ORDER_ID_INVALID,
				ticker_id: self.ticker_id,
				side: side.to_wire(),
				price: resting.price,
				qty: fill_qty,
				priority: PRIORITY_INVALID,
			});
			updates.push(if resting_leaves > 0 {
				MEMarketUpdate {
					kind: MarketUpdateType::Modify as u8,
					order_id: resting.market_order_id,
					ticker_id: self.ticker_id,
					side: resting.side.to_wire(),
					price: resting.price,
					qty: resting_leaves,
					priority: resting.priority,
				}
			} else {
				// Fully filled resting orders leave the book, which
				// book-level consumers learn through a cancel record.
				MEMarketUpdate {
					kind: MarketUpdateType::Cancel as u8,
					order_id: resting.market_order_id,
					ticker_id: self.ticker_id,
					side: resting.side.to_wire(),
					price: resting.price,
					qty: fill_qty,
					priority: resting.priority,
				}
			});

			responses.push(MEClientResponse {
				kind: ClientResponseType::Filled as u8,
				client_id,
				ticker_id: self.ticker_id,
				client_order_id,
				market_order_id,
				side: side.to_wire(),
				price: resting.price,
				exec_qty: fill_qty,
				leaves_qty,
			});
			responses.push(MEClientResponse {
				kind: ClientResponseType::Filled as u8,
				client_id: resting.client_id,
				ticker_id: self.ticker_id,
				client_order_id: resting.client_order_id,
				market_order_id: resting.market_order_id,
				side: resting.side.to_wire(),
				price: resting.price,
				exec_qty: fill_qty,
				leaves_qty: resting_leaves,
			});

			if resting_leaves == 0 {
				self.live_orders
					.remove(&(resting.client_id, resting.client_order_id));
				self.remove_order(resting_idx);
			}
		}

		leaves_qty
	}

	// ------------------------------------------------------------------
	// Arena and list plumbing
	// ------------------------------------------------------------------

	fn price_slot(price: Price) -> usize {
		price.rem_euclid(MAX_PRICE_LEVELS as i64) as usize
	}

	fn alloc_order(&mut self, node: OrderNode) -> u32 {
		match self.free_orders.pop() {
			Some(idx) => {
				self.orders[idx as usize] = node;
				idx
			}
			None => {
				self.orders.push(node);
				(self.orders.len() - 1) as u32
			}
		}
	}

	fn alloc_level(&mut self, node: LevelNode) -> u32 {
		match self.free_levels.pop() {
			Some(idx) => {
				self.levels[idx as usize] = node;
				idx
			}
			None => {
				self.levels.push(node);
				(self.levels.len() - 1) as u32
			}
		}
	}

	/// Rest the residual of an order at its price level, creating the
	/// level if needed, and return the assigned queue priority.
	fn insert_order(
		&mut self,
		client_id: ClientId,
		client_order_id: OrderId,
		market_order_id: OrderId,
		side: Side,
		price: Price,
		qty: Qty,
	) -> Priority {
		let level_idx = self.find_or_create_level(side, price);

		let first = self.levels[level_idx as usize].first_order;
		let priority = if first == NIL {
			1
		} else {
			let tail = self.orders[first as usize].prev;
			self.orders[tail as usize].priority + 1
		};

		let order_idx = self.alloc_order(OrderNode {
			client_id,
			client_order_id,
			market_order_id,
			side,
			price,
			qty,
			priority,
			prev: NIL,
			next: NIL,
		});

		if first == NIL {
			self.orders[order_idx as usize].prev = order_idx;
			self.orders[order_idx as usize].next = order_idx;
			self.levels[level_idx as usize].first_order = order_idx;
		} else {
			let tail = self.orders[first as usize].prev;
			self.orders[tail as usize].next = order_idx;
			self.orders[order_idx as usize].prev = tail;
			self.orders[order_idx as usize].next = first;
			self.orders[first as usize].prev = order_idx;
		}

		self.live_orders
			.insert((client_id, client_order_id), order_idx);
		priority
	}

	/// Unlink an order from its level FIFO and free its slot, removing
	/// the level when it empties. Callers maintain `live_orders`.
	fn remove_order(&mut self, order_idx: u32) {
		let order = self.orders[order_idx as usize];

		let slot = Self::price_slot(order.price);
		let level_idx = self.price_table[slot];
		assert!(
			level_idx != NIL && self.levels[level_idx as usize].price == order.price,
			"order {} not reachable through the price table",
			order.market_order_id
		);

		let next = order.next;
		if next == order_idx {
			self.levels[level_idx as usize].first_order = NIL;
			self.remove_level(level_idx);
		} else {
			let prev = order.prev;
			self.orders[prev as usize].next = next;
			self.orders[next as usize].prev = prev;
			if self.levels[level_idx as usize].first_order == order_idx {
				self.levels[level_idx as usize].first_order = next;
			}
		}

		self.free_orders.push(order_idx);
	}

	fn find_or_create_level(&mut self, side: Side, price: Price) -> u32 {
		let slot = Self::price_slot(price);
		let existing = self.price_table[slot];
		if existing != NIL {
			let level = &self.levels[existing as usize];
			assert!(
				level.price == price,
				"price table collision: slot {} holds {} while inserting {}",
				slot,
				level.price,
				price
			);
			return existing;
		}

		let level_idx = self.alloc_level(LevelNode {
			side,
			price,
			first_order: NIL,
			prev: NIL,
			next: NIL,
		});
		self.price_table[slot] = level_idx;
		self.link_level(side, level_idx);
		level_idx
	}

	/// Splice a fresh level into its side's circular price-ordered list:
	/// descending for bids, ascending for asks.
	fn link_level(&mut self, side: Side, level_idx: u32) {
		let head = match side {
			Side::Buy => self.bids_head,
			Side::Sell => self.asks_head,
			Side::Invalid => unreachable!("levels always carry a real side"),
		};

		if head == NIL {
			self.levels[level_idx as usize].prev = level_idx;
			self.levels[level_idx as usize].next = level_idx;
			match side {
				Side::Buy => self.bids_head = level_idx,
				Side::Sell => self.asks_head = level_idx,
				Side::Invalid => unreachable!(),
			}
			return;
		}

		let price = self.levels[level_idx as usize].price;
		let mut cur = head;
		loop {
			let cur_price = self.levels[cur as usize].price;
			let precedes = match side {
				Side::Buy => price > cur_price,
				Side::Sell => price < cur_price,
				Side::Invalid => unreachable!(),
			};
			if precedes {
				self.splice_before(cur, level_idx);
				if cur == head {
					match side {
						Side::Buy => self.bids_head = level_idx,
						Side::Sell => self.asks_head = level_idx,
						Side::Invalid => unreachable!(),
					}
				}
				return;
			}
			cur = self.levels[cur as usize].next;
			if cur == head {
				break;
			}
		}

		// Worst price on its side: append at the tail, which in a
		// circular list is "before the head" without moving the head.
		self.splice_before(head, level_idx);
	}

	fn splice_before(&mut self, pos: u32, new_idx: u32) {
		let prev = self.levels[pos as usize].prev;
		self.levels[prev as usize].next = new_idx;
		self.levels[new_idx as usize].prev = prev;
		self.levels[new_idx as usize].next = pos;
		self.levels[pos as usize].prev = new_idx;
	}

	fn remove_level(&mut self, level_idx: u32) {
		let level = self.levels[level_idx as usize];
		let head = match level.side {
			Side::Buy => &mut self.bids_head,
			Side::Sell => &mut self.asks_head,
			Side::Invalid => unreachable!("levels always carry a real side"),
		};

		if level.next == level_idx {
			*head = NIL;
		} else {
			self.levels[level.prev as usize].next = level.next;
			self.levels[level.next as usize].prev = level.prev;
			if *head == level_idx {
				*head = level.next;
			}
		}

		self.price_table[Self::price_slot(level.price)] = NIL;
		self.free_levels.push(level_idx);
	}

	fn level_qty(&self, level_idx: u32) -> Qty {
		let first = self.levels[level_idx as usize].first_order;
		let mut total: Qty = 0;
		let mut cur = first;
		loop {
			total += self.orders[cur as usize].qty;
			cur = self.orders[cur as usize].next;
			if cur == first {
				break;
			}
		}
		total
	}

	fn send_reject(
		&self,
		client_id: ClientId,
		client_order_id: OrderId,
		side: Side,
		price: Price,
		responses: &mut RingProducer<MEClientResponse>,
	) {
		responses.push(MEClientResponse {
			kind: ClientResponseType::Rejected as u8,
			client_id,
			ticker_id: self.ticker_id,
			client_order_id,
			market_order_id: ORDER_ID_INVALID,
			side: side.to_wire(),
			price,
			..MEClientResponse::default()
		});
	}
}
