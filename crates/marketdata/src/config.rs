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

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Default incremental multicast group.
pub const DEFAULT_INCREMENTAL_GROUP: Ipv4Addr = Ipv4Addr::new(233, 252, 14, 3);
pub const DEFAULT_INCREMENTAL_PORT: u16 = 20_001;

/// Default snapshot multicast group.
pub const DEFAULT_SNAPSHOT_GROUP: Ipv4Addr = Ipv4Addr::new(233, 252, 14, 1);
pub const DEFAULT_SNAPSHOT_PORT: u16 = 20_000;

/// Default pause between snapshot cycles.
pub const DEFAULT_SNAPSHOT_INTERVAL_SECS: u64 = 60;

/// Market-data pipeline configuration, shared by the publisher, the
/// snapshot synthesizer and the consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDataConfig {
	pub incremental_group: Ipv4Addr,
	pub incremental_port: u16,
	pub snapshot_group: Ipv4Addr,
	pub snapshot_port: u16,
	/// Wall-clock pause between snapshot cycles.
	pub snapshot_interval_secs: u64,
	/// Core the publisher thread is pinned to; `None` leaves scheduling
	/// to the OS. The synthesizer deliberately stays unpinned to keep
	/// the latency-critical cores free.
	pub publisher_core_id: Option<usize>,
}

impl Default for MarketDataConfig {
	fn default() -> Self {
		Self {
			incremental_group: DEFAULT_INCREMENTAL_GROUP,
			incremental_port: DEFAULT_INCREMENTAL_PORT,
			snapshot_group: DEFAULT_SNAPSHOT_GROUP,
			snapshot_port: DEFAULT_SNAPSHOT_PORT,
			snapshot_interval_secs: DEFAULT_SNAPSHOT_INTERVAL_SECS,
			publisher_core_id: None,
		}
	}
}

impl MarketDataConfig {
	/// Load configuration from environment variables
	pub fn from_env() -> Result<Self, config::ConfigError> {
		dotenv::dotenv().ok();

		let cfg = config::Config::builder()
			.add_source(config::Environment::with_prefix("MARKETDATA"))
			.build()?;

		cfg.try_deserialize()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_groups_are_multicast() {
		let config = MarketDataConfig::default();
		assert!(config.incremental_group.is_multicast());
		assert!(config.snapshot_group.is_multicast());
		assert_ne!(
			(config.incremental_group, config.incremental_port),
			(config.snapshot_group, config.snapshot_port)
		);
	}
}
