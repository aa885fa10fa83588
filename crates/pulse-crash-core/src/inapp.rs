// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-app classification rules.

use serde::{Deserialize, Serialize};

use crate::frame::{Frame, Lane, ResolvedToken};

/// Rules separating application frames from third-party and runtime frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InAppRules {
	/// JVM classes starting with any of these prefixes are in-app. The empty
	/// prefix matches every class.
	pub java_in_app_prefixes: Vec<String>,
	/// JS files whose normalised path contains any marker are third-party.
	pub js_out_of_app_markers: Vec<String>,
	/// Native libraries (basenames) considered in-app.
	pub native_in_app_libs: Vec<String>,
}

impl Default for InAppRules {
	fn default() -> Self {
		Self {
			java_in_app_prefixes: vec![String::new()],
			js_out_of_app_markers: vec!["/node_modules/".to_string(), "node_modules/".to_string()],
			native_in_app_libs: Vec::new(),
		}
	}
}

impl InAppRules {
	/// Classify a lane token (`file#fn`, `class#method`, `lib#symbol`).
	pub fn classify(&self, lane: Lane, token: &str) -> bool {
		let subject = token.split('#').next().unwrap_or_default();
		match lane {
			Lane::Java => self.is_java_in_app(subject),
			Lane::Js => self.is_js_in_app(subject),
			Lane::Native => self.native_in_app_libs.iter().any(|lib| lib == subject),
			Lane::Unknown => false,
		}
	}

	pub fn is_in_app(&self, frame: &Frame) -> bool {
		self.classify(frame.lane(), frame.token())
	}

	pub fn is_resolved_in_app(&self, resolved: &ResolvedToken) -> bool {
		self.classify(resolved.lane, &resolved.token)
	}

	pub fn is_java_in_app(&self, class: &str) -> bool {
		self.java_in_app_prefixes
			.iter()
			.any(|prefix| class.starts_with(prefix.as_str()))
	}

	pub fn is_js_in_app(&self, file: &str) -> bool {
		let normalized = file.replace('\\', "/");
		!self
			.js_out_of_app_markers
			.iter()
			.any(|marker| normalized.contains(marker.as_str()))
	}
}
