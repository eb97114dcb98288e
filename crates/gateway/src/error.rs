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

use thiserror::Error;

/// Startup-time failures of the order gateway.
///
/// Once a gateway thread is running, business-level problems are
/// answered in-band with typed responses and infrastructure invariant
/// breaches are fatal; only initialization is an ordinary `Result`.
#[derive(Debug, Error)]
pub enum GatewayError {
	#[error("socket setup failed: {0}")]
	Io(#[from] std::io::Error),
	#[error("configuration error: {0}")]
	Config(#[from] config::ConfigError),
}
