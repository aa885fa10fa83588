// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Symbolication configuration section: cache bounds and timeouts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SymbolicationConfigLayer {
	pub presence_ttl_secs: Option<u64>,
	pub presence_max_entries: Option<usize>,
	pub artifact_ttl_secs: Option<u64>,
	pub artifact_max_entries: Option<usize>,
	pub fetch_timeout_ms: Option<u64>,
	pub retrace_timeout_ms: Option<u64>,
}

impl SymbolicationConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.presence_ttl_secs.is_some() {
			self.presence_ttl_secs = other.presence_ttl_secs;
		}
		if other.presence_max_entries.is_some() {
			self.presence_max_entries = other.presence_max_entries;
		}
		if other.artifact_ttl_secs.is_some() {
			self.artifact_ttl_secs = other.artifact_ttl_secs;
		}
		if other.artifact_max_entries.is_some() {
			self.artifact_max_entries = other.artifact_max_entries;
		}
		if other.fetch_timeout_ms.is_some() {
			self.fetch_timeout_ms = other.fetch_timeout_ms;
		}
		if other.retrace_timeout_ms.is_some() {
			self.retrace_timeout_ms = other.retrace_timeout_ms;
		}
	}

	pub fn finalize(self) -> SymbolicationConfig {
		let defaults = SymbolicationConfig::default();
		SymbolicationConfig {
			presence_ttl_secs: self.presence_ttl_secs.unwrap_or(defaults.presence_ttl_secs),
			presence_max_entries: self
				.presence_max_entries
				.unwrap_or(defaults.presence_max_entries),
			artifact_ttl_secs: self.artifact_ttl_secs.unwrap_or(defaults.artifact_ttl_secs),
			artifact_max_entries: self
				.artifact_max_entries
				.unwrap_or(defaults.artifact_max_entries),
			fetch_timeout_ms: self.fetch_timeout_ms.unwrap_or(defaults.fetch_timeout_ms),
			retrace_timeout_ms: self.retrace_timeout_ms.unwrap_or(defaults.retrace_timeout_ms),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SymbolicationConfig {
	/// How long a presence or absence verdict is trusted.
	pub presence_ttl_secs: u64,
	pub presence_max_entries: usize,
	/// Parsed artifacts expire this long after their last access.
	pub artifact_ttl_secs: u64,
	pub artifact_max_entries: usize,
	pub fetch_timeout_ms: u64,
	pub retrace_timeout_ms: u64,
}

impl SymbolicationConfig {
	pub fn presence_ttl(&self) -> Duration {
		Duration::from_secs(self.presence_ttl_secs)
	}

	pub fn artifact_ttl(&self) -> Duration {
		Duration::from_secs(self.artifact_ttl_secs)
	}

	pub fn fetch_timeout(&self) -> Duration {
		Duration::from_millis(self.fetch_timeout_ms)
	}

	pub fn retrace_timeout(&self) -> Duration {
		Duration::from_millis(self.retrace_timeout_ms)
	}
}

impl Default for SymbolicationConfig {
	fn default() -> Self {
		Self {
			presence_ttl_secs: 300,
			presence_max_entries: 500,
			artifact_ttl_secs: 86400, // 24 hours
			artifact_max_entries: 200,
			fetch_timeout_ms: 10_000,
			retrace_timeout_ms: 5_000,
		}
	}
}
