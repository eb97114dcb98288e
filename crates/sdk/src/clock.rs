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

use std::time::{SystemTime, UNIX_EPOCH};

/// Nanoseconds elapsed since the Unix epoch.
///
/// Receive timestamps taken here order client requests across gateway
/// connections, so all components on a host must read the same clock.
pub fn nanos_now() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_nanos() as u64)
		.unwrap_or(0)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_nanos_is_monotonic_enough() {
		let a = nanos_now();
		let b = nanos_now();
		assert!(b >= a);
		assert!(a > 1_600_000_000 * 1_000_000_000);
	}
}
