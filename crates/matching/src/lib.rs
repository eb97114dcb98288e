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

//! Crucible Matching Engine
//!
//! Price-time-priority limit order books and the single-threaded loop
//! that drives them.
//!
//! Architecture:
//! - One order book per instrument, owned exclusively by the matching
//!   thread; no locks anywhere on the request path
//! - Arena-allocated orders and price levels linked by index, so the hot
//!   path allocates nothing
//! - Requests arrive on an SPSC ring from the order gateway; responses
//!   and market updates leave on SPSC rings toward the gateway and the
//!   market-data publisher

pub mod config;
pub mod engine;
pub mod orderbook;

pub use config::MatchingConfig;
pub use engine::MatchingEngine;
pub use orderbook::OrderBook;
