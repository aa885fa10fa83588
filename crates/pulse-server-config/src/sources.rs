// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, TOML files and environment
//! variables.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	GroupingConfigLayer, LogFormat, LoggingConfigLayer, SymbolicationConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/pulse/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: PULSE_SERVER_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			symbolication: Some(load_symbolication_from_env()?),
			grouping: Some(load_grouping_from_env()?),
			logging: Some(load_logging_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn parse_value<T: std::str::FromStr>(
	name: &str,
	value: &str,
	kind: &str,
) -> Result<T, ConfigError> {
	value.parse().map_err(|_| ConfigError::InvalidValue {
		key: name.to_string(),
		message: format!("invalid {kind} value '{value}'"),
	})
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	env_var(name).map(|v| parse_value(name, &v, "u64")).transpose()
}

fn env_usize(name: &str) -> Result<Option<usize>, ConfigError> {
	env_var(name).map(|v| parse_value(name, &v, "usize")).transpose()
}

/// Comma separated list. A set-but-blank variable is not a list; the empty
/// Java prefix is configured through TOML.
fn env_list(name: &str) -> Option<Vec<String>> {
	env_var(name).map(|s| split_list(&s))
}

fn split_list(s: &str) -> Vec<String> {
	s.split(',')
		.map(|s| s.trim().to_string())
		.filter(|s| !s.is_empty())
		.collect()
}

fn load_symbolication_from_env() -> Result<SymbolicationConfigLayer, ConfigError> {
	Ok(SymbolicationConfigLayer {
		presence_ttl_secs: env_u64("PULSE_SERVER_PRESENCE_TTL_SECS")?,
		presence_max_entries: env_usize("PULSE_SERVER_PRESENCE_MAX_ENTRIES")?,
		artifact_ttl_secs: env_u64("PULSE_SERVER_ARTIFACT_TTL_SECS")?,
		artifact_max_entries: env_usize("PULSE_SERVER_ARTIFACT_MAX_ENTRIES")?,
		fetch_timeout_ms: env_u64("PULSE_SERVER_ARTIFACT_FETCH_TIMEOUT_MS")?,
		retrace_timeout_ms: env_u64("PULSE_SERVER_RETRACE_TIMEOUT_MS")?,
	})
}

fn load_grouping_from_env() -> Result<GroupingConfigLayer, ConfigError> {
	Ok(GroupingConfigLayer {
		top_n_frames: env_usize("PULSE_SERVER_GROUPING_TOP_N_FRAMES")?,
		java_in_app_prefixes: env_list("PULSE_SERVER_GROUPING_JAVA_IN_APP_PREFIXES"),
		js_out_of_app_markers: env_list("PULSE_SERVER_GROUPING_JS_OUT_OF_APP_MARKERS"),
		native_in_app_libs: env_list("PULSE_SERVER_GROUPING_NATIVE_IN_APP_LIBS"),
	})
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	let format = env_var("PULSE_SERVER_LOG_FORMAT")
		.map(|v| {
			v.parse::<LogFormat>().map_err(|message| ConfigError::InvalidValue {
				key: "PULSE_SERVER_LOG_FORMAT".to_string(),
				message,
			})
		})
		.transpose()?;

	Ok(LoggingConfigLayer {
		level: env_var("PULSE_SERVER_LOG_LEVEL"),
		format,
	})
}
