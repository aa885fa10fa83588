// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Stack frame model.
//!
//! A [`Frame`] carries the fields shared by every lane (position, raw line,
//! in-app flag and the current best-known token) plus a lane-specific payload
//! in [`FrameDetail`]. Frames are not modified by symbolication: each one
//! yields a [`ResolvedToken`], and a blank resolution keeps the frame's token.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CrashError;

/// Placeholder used when a JS frame carries no usable function name.
pub const ANONYMOUS: &str = "anonymous";

/// Resolution lineage of a stack frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Lane {
	Js,
	Java,
	Native,
	Unknown,
}

impl Lane {
	/// Platform tag used inside signatures.
	pub fn platform_tag(&self) -> &'static str {
		match self {
			Self::Js => "js",
			Self::Java => "java",
			Self::Native => "android-ndk",
			Self::Unknown => "unknown",
		}
	}
}

impl fmt::Display for Lane {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Js => write!(f, "JS"),
			Self::Java => write!(f, "JAVA"),
			Self::Native => write!(f, "NATIVE"),
			Self::Unknown => write!(f, "UNKNOWN"),
		}
	}
}

impl FromStr for Lane {
	type Err = CrashError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_uppercase().as_str() {
			"JS" => Ok(Self::Js),
			"JAVA" => Ok(Self::Java),
			"NATIVE" | "NDK" => Ok(Self::Native),
			"UNKNOWN" => Ok(Self::Unknown),
			_ => Err(CrashError::InvalidLane(s.to_string())),
		}
	}
}

/// JavaScript / React Native frame payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsFrame {
	pub file: String,
	pub function: String,
	/// 1-based line in the generated bundle.
	pub line: Option<u32>,
	/// 1-based column in the generated bundle.
	pub column: Option<u32>,
}

/// JVM frame payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JavaFrame {
	pub class: String,
	pub method: String,
	pub file: Option<String>,
	pub line: Option<u32>,
}

/// Native (NDK) frame payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeFrame {
	pub pc: String,
	/// Library basename, e.g. `libapp.so`.
	pub lib: String,
	pub symbol: Option<String>,
}

/// Lane-specific part of a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "lane", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrameDetail {
	Js(JsFrame),
	Java(JavaFrame),
	Native(NativeFrame),
}

/// A single parsed stack frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
	/// 0-based index in the original trace.
	pub original_position: usize,
	/// Unmodified line as supplied by the client.
	pub raw_line: String,
	pub in_app: bool,
	token: String,
	pub detail: FrameDetail,
}

impl Frame {
	pub fn new(original_position: usize, raw_line: impl Into<String>, detail: FrameDetail) -> Self {
		let token = default_token(&detail);
		Self {
			original_position,
			raw_line: raw_line.into(),
			in_app: false,
			token,
			detail,
		}
	}

	pub fn js(original_position: usize, raw_line: impl Into<String>, frame: JsFrame) -> Self {
		Self::new(original_position, raw_line, FrameDetail::Js(frame))
	}

	pub fn java(original_position: usize, raw_line: impl Into<String>, frame: JavaFrame) -> Self {
		Self::new(original_position, raw_line, FrameDetail::Java(frame))
	}

	pub fn native(
		original_position: usize,
		raw_line: impl Into<String>,
		frame: NativeFrame,
	) -> Self {
		Self::new(original_position, raw_line, FrameDetail::Native(frame))
	}

	pub fn lane(&self) -> Lane {
		match self.detail {
			FrameDetail::Js(_) => Lane::Js,
			FrameDetail::Java(_) => Lane::Java,
			FrameDetail::Native(_) => Lane::Native,
		}
	}

	/// Current best-known identifier for this frame.
	pub fn token(&self) -> &str {
		&self.token
	}

	/// Resolved form of this frame. A blank `token` or `line` falls back to
	/// the frame's own so an identifier is never lost.
	pub fn resolved(&self, token: impl Into<String>, line: impl Into<String>) -> ResolvedToken {
		let mut resolved = self.unresolved();
		let token = token.into();
		if !token.trim().is_empty() {
			resolved.token = token;
		}
		let line = line.into();
		if !line.trim().is_empty() {
			resolved.line = line;
		}
		resolved
	}

	pub fn as_js(&self) -> Option<&JsFrame> {
		match &self.detail {
			FrameDetail::Js(js) => Some(js),
			_ => None,
		}
	}

	pub fn as_java(&self) -> Option<&JavaFrame> {
		match &self.detail {
			FrameDetail::Java(java) => Some(java),
			_ => None,
		}
	}

	/// Unresolved form of this frame: its current token and trimmed raw line.
	pub fn unresolved(&self) -> ResolvedToken {
		ResolvedToken {
			lane: self.lane(),
			original_position: self.original_position,
			token: self.token.clone(),
			line: self.raw_line.trim().to_string(),
		}
	}
}

fn default_token(detail: &FrameDetail) -> String {
	match detail {
		FrameDetail::Js(js) => format!("{}#{}", js.file, js.function),
		FrameDetail::Java(java) => java_token(&java.class, &java.method),
		FrameDetail::Native(native) => match &native.symbol {
			Some(symbol) => format!("{}#{}", native.lib, symbol),
			None => format!("{}#{}", native.lib, native.pc),
		},
	}
}

/// Token for a JVM frame; a frame without a method is just its class.
pub fn java_token(class: &str, method: &str) -> String {
	if method.is_empty() {
		class.to_string()
	} else {
		format!("{class}#{method}")
	}
}

/// Output of symbolication for one frame.
///
/// Retrace may expand a single JVM frame into several (inlining), in which
/// case every expansion shares the `original_position` of its source frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedToken {
	pub lane: Lane,
	pub original_position: usize,
	/// Identifier used for grouping, in the lane's token format.
	pub token: String,
	/// Human-readable stack line used when rebuilding the trace.
	pub line: String,
}
