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

//! Logging initialization for the exchange processes
//!
//! File logging with optional console output, configured through the
//! environment:
//!
//! - `RUST_LOG`: log level filter (default: `info`)
//! - `LOG_DIR`: root directory for log files (default: `./logs`)
//! - `LOG_TO_CONSOLE`: also log to stderr when `true`, `1` or `yes`
//!
//! Files rotate daily under `{LOG_DIR}/{component}/` with names like
//! `gateway.2026-01-03.log`. ANSI colors are disabled in file output and
//! enabled on the console.

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result};
use tracing::info;
use tracing_appender::{
	non_blocking,
	rolling::{self, Rotation},
};
use tracing_subscriber::{
	fmt, layer::SubscriberExt, registry::Registry, util::SubscriberInitExt, EnvFilter,
};

use crate::config::{DEFAULT_LOG_LEVEL, DEFAULT_LOG_TO_CONSOLE, LOG_COMPONENT_NAME};

// Store log guard to prevent log loss on program exit
static LOG_GUARD: OnceLock<non_blocking::WorkerGuard> = OnceLock::new();

fn log_root() -> String {
	env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string())
}

/// Setup daily-rolling file logging layer.
///
/// `tracing-appender` handles the rotation, so long-running processes
/// will automatically switch files when the date changes.
fn setup_file_logging(log_dir: &Path) -> Result<non_blocking::NonBlocking> {
	let file_appender = rolling::RollingFileAppender::builder()
		.rotation(Rotation::DAILY)
		.filename_prefix(LOG_COMPONENT_NAME.to_string())
		.filename_suffix("log")
		.build(log_dir)
		.with_context(|| {
			format!(
				"Failed to create rolling file appender in {}",
				log_dir.display()
			)
		})?;

	let (file_writer, guard) = non_blocking(file_appender);
	LOG_GUARD.set(guard).ok();

	Ok(file_writer)
}

/// Initialize logging with file output and optional console output.
///
/// Returns an error if the log directory or file cannot be created;
/// calling it a second time in the same process is an error from the
/// subscriber registry.
pub fn init_logging() -> Result<()> {
	dotenv::dotenv().ok();

	let log_level = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());

	let log_dir = Path::new(&log_root()).join(LOG_COMPONENT_NAME);
	std::fs::create_dir_all(&log_dir)
		.with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

	let file_writer = setup_file_logging(&log_dir)?;

	let log_to_console = env::var("LOG_TO_CONSOLE")
		.map(|v| v == "true" || v == "1" || v == "yes")
		.unwrap_or(DEFAULT_LOG_TO_CONSOLE);

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

	let subscriber = Registry::default().with(filter).with(
		fmt::layer()
			.with_writer(file_writer)
			.with_thread_ids(true)
			.with_target(true)
			.with_ansi(false),
	);

	if log_to_console {
		subscriber
			.with(
				fmt::layer()
					.with_writer(std::io::stderr)
					.with_thread_ids(true)
					.with_target(true)
					.with_ansi(true),
			)
			.try_init()
			.context("logging already initialized")?;
	} else {
		subscriber.try_init().context("logging already initialized")?;
	}

	info!(target: "gateway", "Log level: {}", log_level);
	info!(target: "gateway", "Log directory: {}", log_dir.display());
	if log_to_console {
		info!(target: "gateway", "Console output: enabled");
	}

	Ok(())
}
