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

//! Crucible Order Gateway
//!
//! Both halves of the order-entry path:
//!
//! - the exchange-side order server: TCP accept loop, per-client
//!   sequence-number discipline, connection ownership, and the FIFO
//!   sequencer that releases each poll cycle's requests to the matching
//!   engine in receive-time order
//! - the trading-side gateway client that stamps outgoing sequence
//!   numbers and validates inbound responses

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod sequencer;
pub mod server;
pub mod session;

pub use client::OrderGatewayClient;
pub use config::{ClientGatewayConfig, GatewayConfig};
pub use error::GatewayError;
pub use sequencer::FifoSequencer;
pub use server::OrderServer;
pub use session::ClientSessions;
