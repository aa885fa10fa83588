// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Grouping configuration section: signature depth and in-app rules.

use pulse_crash_core::{InAppRules, DEFAULT_TOP_N_FRAMES};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GroupingConfigLayer {
	pub top_n_frames: Option<usize>,
	pub java_in_app_prefixes: Option<Vec<String>>,
	pub js_out_of_app_markers: Option<Vec<String>>,
	pub native_in_app_libs: Option<Vec<String>>,
}

impl GroupingConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.top_n_frames.is_some() {
			self.top_n_frames = other.top_n_frames;
		}
		if other.java_in_app_prefixes.is_some() {
			self.java_in_app_prefixes = other.java_in_app_prefixes;
		}
		if other.js_out_of_app_markers.is_some() {
			self.js_out_of_app_markers = other.js_out_of_app_markers;
		}
		if other.native_in_app_libs.is_some() {
			self.native_in_app_libs = other.native_in_app_libs;
		}
	}

	pub fn finalize(self) -> GroupingConfig {
		let defaults = InAppRules::default();
		GroupingConfig {
			top_n_frames: self.top_n_frames.unwrap_or(DEFAULT_TOP_N_FRAMES),
			java_in_app_prefixes: self
				.java_in_app_prefixes
				.unwrap_or(defaults.java_in_app_prefixes),
			js_out_of_app_markers: self
				.js_out_of_app_markers
				.unwrap_or(defaults.js_out_of_app_markers),
			native_in_app_libs: self.native_in_app_libs.unwrap_or(defaults.native_in_app_libs),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupingConfig {
	/// Number of in-app frames that enter a signature.
	pub top_n_frames: usize,
	pub java_in_app_prefixes: Vec<String>,
	pub js_out_of_app_markers: Vec<String>,
	pub native_in_app_libs: Vec<String>,
}

impl GroupingConfig {
	pub fn in_app_rules(&self) -> InAppRules {
		InAppRules {
			java_in_app_prefixes: self.java_in_app_prefixes.clone(),
			js_out_of_app_markers: self.js_out_of_app_markers.clone(),
			native_in_app_libs: self.native_in_app_libs.clone(),
		}
	}
}

impl Default for GroupingConfig {
	fn default() -> Self {
		GroupingConfigLayer::default().finalize()
	}
}
