// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration for the Pulse symbolication and grouping server.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`PULSE_SERVER_*`)
//!
//! # Usage
//!
//! ```ignore
//! use pulse_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("presence ttl: {:?}", config.symbolication.presence_ttl());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerConfig {
	pub symbolication: SymbolicationConfig,
	pub grouping: GroupingConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`PULSE_SERVER_*`)
/// 2. Config file (`/etc/pulse/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![Box::new(EnvSource)])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let symbolication = layer.symbolication.unwrap_or_default().finalize();
	let grouping = layer.grouping.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_config(&symbolication, &grouping)?;

	info!(
		presence_ttl_secs = symbolication.presence_ttl_secs,
		presence_max_entries = symbolication.presence_max_entries,
		artifact_max_entries = symbolication.artifact_max_entries,
		top_n_frames = grouping.top_n_frames,
		log_format = %logging.format,
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		symbolication,
		grouping,
		logging,
	})
}

/// Validate bounds that would otherwise disable caching or grouping.
fn validate_config(
	symbolication: &SymbolicationConfig,
	grouping: &GroupingConfig,
) -> Result<(), ConfigError> {
	let non_zero = [
		("symbolication.presence_ttl_secs", symbolication.presence_ttl_secs),
		("symbolication.presence_max_entries", symbolication.presence_max_entries as u64),
		("symbolication.artifact_ttl_secs", symbolication.artifact_ttl_secs),
		("symbolication.artifact_max_entries", symbolication.artifact_max_entries as u64),
		("symbolication.fetch_timeout_ms", symbolication.fetch_timeout_ms),
		("symbolication.retrace_timeout_ms", symbolication.retrace_timeout_ms),
		("grouping.top_n_frames", grouping.top_n_frames as u64),
	];

	if let Some((key, _)) = non_zero.iter().find(|(_, value)| *value == 0) {
		return Err(ConfigError::Validation(format!("{key} must be greater than zero")));
	}

	Ok(())
}
