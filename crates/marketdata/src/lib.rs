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

//! Crucible Market Data
//!
//! The full market-data pipeline, both sides of the wire:
//!
//! - the publisher that stamps the matching engine's updates with a
//!   global incremental sequence and multicasts them
//! - the snapshot synthesizer that shadows every live order off the
//!   incremental stream and periodically multicasts a full
//!   START/CLEAR/ADD.../END cycle on a second group
//! - the consumer that detects incremental gaps and resynchronizes
//!   from the snapshot stream plus buffered incrementals
//!
//! The recovery state machine ([`sync::SnapshotSync`]) and the snapshot
//! shadow state ([`snapshot::SnapshotState`]) are socket-free and fully
//! deterministic; the worker threads around them only move bytes.

pub mod config;
pub mod consumer;
pub mod error;
pub mod publisher;
pub mod snapshot;
pub mod sync;

pub use config::MarketDataConfig;
pub use error::MarketDataError;
pub use consumer::MarketDataConsumer;
pub use publisher::MarketDataPublisher;
pub use snapshot::{SnapshotState, SnapshotSynthesizer};
pub use sync::{Feed, SnapshotSync, SyncAction};
