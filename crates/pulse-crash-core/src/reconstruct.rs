// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Rebuilding a full symbolicated trace from per-lane resolution output.

use std::fmt::Write;

use crate::frame::{Lane, ResolvedToken};
use crate::parser::ParsedFrames;

/// Resolution output for every lane of one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompleteSymbolication {
	pub js: Vec<ResolvedToken>,
	pub java: Vec<ResolvedToken>,
	pub native: Vec<ResolvedToken>,
}

impl CompleteSymbolication {
	/// Output where nothing was resolved.
	pub fn unresolved(parsed: &ParsedFrames) -> Self {
		let lane = |frames: &[crate::frame::Frame]| frames.iter().map(|f| f.unresolved()).collect();
		Self {
			js: lane(&parsed.js_frames),
			java: lane(&parsed.java_frames),
			native: lane(&parsed.native_frames),
		}
	}

	pub fn lane(&self, lane: Lane) -> &[ResolvedToken] {
		match lane {
			Lane::Js => &self.js,
			Lane::Java => &self.java,
			Lane::Native => &self.native,
			Lane::Unknown => &[],
		}
	}

	/// Rebuild the trace: header line, then every resolved line in original
	/// stack order, indented by two spaces.
	///
	/// Expansions of one frame share its position and the sort is stable, so
	/// inlined retrace frames stay adjacent and in retrace order.
	pub fn reconstruct(&self, parsed: &ParsedFrames) -> String {
		let mut out = String::new();

		let header = parsed.exception_header_line.as_deref().or_else(|| {
			[Lane::Js, Lane::Java, Lane::Native]
				.into_iter()
				.find_map(|l| parsed.types(l).first().map(String::as_str))
		});
		if let Some(header) = header {
			out.push_str(header);
			out.push('\n');
		}

		let mut lines: Vec<&ResolvedToken> = self
			.js
			.iter()
			.chain(self.java.iter())
			.chain(self.native.iter())
			.collect();
		lines.sort_by_key(|r| r.original_position);

		for r in lines {
			let _ = writeln!(out, "  {}", r.line);
		}
		out
	}
}
