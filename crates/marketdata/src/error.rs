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

/// Startup-time failures of the market-data components.
///
/// The running pipeline treats send failures as ordinary loss on an
/// unreliable stream and state inconsistencies as fatal; only socket
/// and configuration setup report errors to the caller.
#[derive(Debug, Error)]
pub enum MarketDataError {
	#[error("socket setup failed: {0}")]
	Io(#[from] std::io::Error),
	#[error("configuration error: {0}")]
	Config(#[from] config::ConfigError),
}
