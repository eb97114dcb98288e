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

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

// Logging configuration constants
/// Default log level (can be overridden by RUST_LOG environment variable)
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default log directory component name
pub const LOG_COMPONENT_NAME: &str = "gateway";

/// Default console output enabled (can be overridden by LOG_TO_CONSOLE environment variable)
pub const DEFAULT_LOG_TO_CONSOLE: bool = false;

/// Default order server bind address
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:12345";

/// Exchange-side gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
	/// Address the order server listens on.
	pub bind_addr: SocketAddr,
	/// Core the gateway thread is pinned to; `None` leaves scheduling
	/// to the OS.
	pub core_id: Option<usize>,
}

impl Default for GatewayConfig {
	fn default() -> Self {
		Self {
			bind_addr: DEFAULT_BIND_ADDR.parse().expect("default bind address parses"),
			core_id: None,
		}
	}
}

impl GatewayConfig {
	/// Load configuration from environment variables
	pub fn from_env() -> Result<Self, config::ConfigError> {
		dotenv::dotenv().ok();

		let cfg = config::Config::builder()
			.add_source(config::Environment::with_prefix("GATEWAY"))
			.build()?;

		cfg.try_deserialize()
	}
}

/// Trading-side gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientGatewayConfig {
	/// Address of the exchange's order server.
	pub server_addr: SocketAddr,
	/// Client id this session trades as; the first connection to send
	/// it claims it on the exchange side.
	pub client_id: u32,
}

impl Default for ClientGatewayConfig {
	fn default() -> Self {
		Self {
			server_addr: DEFAULT_BIND_ADDR.parse().expect("default bind address parses"),
			client_id: 0,
		}
	}
}
