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

//! Crucible SDK
//!
//! Shared foundation for the exchange and trading processes:
//!
//! - fixed-width identifier types with invalid sentinels and the bounded
//!   capacity constants every component is sized against
//! - packed binary wire records for the order-entry and market-data paths
//! - the bounded SPSC ring used for every cross-thread hand-off
//! - non-blocking TCP and UDP-multicast socket plumbing
//! - the strategy-facing trade-event handler trait

pub mod clock;
pub mod handler;
pub mod net;
pub mod spsc;
pub mod types;
pub mod wire;

pub use clock::nanos_now;
pub use handler::TradeEventHandler;
pub use spsc::{RingConsumer, RingProducer, SpscRing};
pub use types::*;
pub use wire::{
	ClientRequestType, ClientResponseType, MDPMarketUpdate, MEClientRequest, MEClientResponse,
	MEMarketUpdate, MarketUpdateType, OMClientRequest, OMClientResponse,
	MDP_MARKET_UPDATE_SIZE, OM_CLIENT_REQUEST_SIZE, OM_CLIENT_RESPONSE_SIZE,
};
