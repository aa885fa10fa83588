// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Raw stack trace parsing.
//!
//! Splits a client-supplied trace into per-lane frame lists (JS, JVM, native)
//! and collects the exception types seen along the way. Mixed traces such as a
//! React Native crash reported through the Android runtime yield frames in
//! several lanes; every frame records its position in the original trace.

use regex::Regex;
use std::sync::LazyLock;

use crate::frame::{Frame, JavaFrame, JsFrame, Lane, NativeFrame};
use crate::inapp::InAppRules;
use crate::normalize::{
	normalize_java_class, normalize_java_method, normalize_js_function, sanitize_js_file,
};

struct Patterns {
	java_top_type: Regex,
	java_caused_by: Regex,
	java_at_line: Regex,
	rn_js_exception: Regex,
	js_err_line: Regex,
	js_at_func_file_line_col: Regex,
	js_at_file_line_col: Regex,
	rn_compact_with_col: Regex,
	rn_compact_no_col: Regex,
	native_line: Regex,
	native_signal: Regex,
}

fn build_patterns() -> Option<Patterns> {
	Some(Patterns {
		java_top_type: Regex::new(r#"^(?:Exception in thread ".*?"\s+)?([\w$]+(?:\.[\w$]+)+)(?::.*)?$"#)
			.ok()?,
		java_caused_by: Regex::new(r"^\s*Caused by:\s*([\w.$]+)(?::.*)?$").ok()?,
		java_at_line: Regex::new(r"^\s*at\s+([^\s(]+)\(([^)]*)\)\s*$").ok()?,
		rn_js_exception: Regex::new(r"JavascriptException.*?\b(Error|Exception)\b").ok()?,
		js_err_line: Regex::new(
			r"^\s*([A-Za-z_$][A-Za-z0-9_$]*(?:Error|Exception)|Invariant Violation)\s*:?.*$",
		)
		.ok()?,
		js_at_func_file_line_col: Regex::new(r"^\s*at\s+([^\s(]+)\s*\(([^:]+):(\d+):(\d+)\)\s*$")
			.ok()?,
		js_at_file_line_col: Regex::new(r"^\s*at\s+([^:]+):(\d+):(\d+)\s*$").ok()?,
		rn_compact_with_col: Regex::new(r"^\s*([^@\s]+)@([^:]+):(\d+):(\d+)\s*$").ok()?,
		rn_compact_no_col: Regex::new(r"^\s*([^@\s]+)@([^:]+):(\d+)\s*$").ok()?,
		native_line: Regex::new(
			r"^\s*#\d+\s+pc\s+([0-9a-fA-Fx]+)\s+(\S+)(?:\s+\(([^)]+)\))?.*$",
		)
		.ok()?,
		native_signal: Regex::new(r"\bSIG[A-Z0-9]+\b").ok()?,
	})
}

static PATTERNS: LazyLock<Option<Patterns>> = LazyLock::new(build_patterns);

/// Frames and exception types extracted from one raw trace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFrames {
	pub js_frames: Vec<Frame>,
	pub java_frames: Vec<Frame>,
	pub native_frames: Vec<Frame>,
	pub js_types: Vec<String>,
	pub java_types: Vec<String>,
	pub native_types: Vec<String>,
	/// Lane of the topmost exception headline.
	pub primary_exception_lane: Option<Lane>,
	/// Full topmost exception line (type and message).
	pub exception_header_line: Option<String>,
	pub react_native_js_exception: bool,
}

impl ParsedFrames {
	pub fn frames(&self, lane: Lane) -> &[Frame] {
		match lane {
			Lane::Js => &self.js_frames,
			Lane::Java => &self.java_frames,
			Lane::Native => &self.native_frames,
			Lane::Unknown => &[],
		}
	}

	pub fn types(&self, lane: Lane) -> &[String] {
		match lane {
			Lane::Js => &self.js_types,
			Lane::Java => &self.java_types,
			Lane::Native => &self.native_types,
			Lane::Unknown => &[],
		}
	}

	pub fn is_empty(&self) -> bool {
		self.js_frames.is_empty() && self.java_frames.is_empty() && self.native_frames.is_empty()
	}

	pub fn frame_count(&self) -> usize {
		self.js_frames.len() + self.java_frames.len() + self.native_frames.len()
	}
}

#[derive(Default)]
struct ParserState {
	saw_top_type: bool,
	react_native_js_exception: bool,
	position: usize,
}

impl ParserState {
	fn next_position(&mut self) -> usize {
		let p = self.position;
		self.position += 1;
		p
	}
}

/// Parse a raw stack trace. Absent traces parse as empty.
pub fn parse_stacktrace(raw: Option<&str>, rules: &InAppRules) -> ParsedFrames {
	let mut parsed = ParsedFrames::default();
	let Some(patterns) = PATTERNS.as_ref() else {
		return parsed;
	};
	let mut state = ParserState::default();

	for line in raw.unwrap_or_default().split(['\n', '\r']) {
		let trimmed = line.trim();
		if trimmed.is_empty() {
			continue;
		}
		detect_exception_types(patterns, line, trimmed, &mut parsed, &mut state);

		if let Some(frame) = parse_js_frame(patterns, line, trimmed, &mut state) {
			parsed.js_frames.push(classified(frame, rules));
		} else if let Some(frame) = parse_java_frame(patterns, line, &mut state) {
			parsed.java_frames.push(classified(frame, rules));
		} else if let Some(frame) = parse_native_frame(patterns, line, &mut state) {
			parsed.native_frames.push(classified(frame, rules));
		}
	}

	parsed.react_native_js_exception = state.react_native_js_exception;
	parsed
}

fn classified(mut frame: Frame, rules: &InAppRules) -> Frame {
	frame.in_app = rules.is_in_app(&frame);
	frame
}

fn detect_exception_types(
	p: &Patterns,
	line: &str,
	trimmed: &str,
	parsed: &mut ParsedFrames,
	state: &mut ParserState,
) {
	if let Some(caps) = p.rn_js_exception.captures(line) {
		state.react_native_js_exception = true;
		if !state.saw_top_type {
			if let Some(ty) = caps.get(1) {
				parsed.js_types.push(ty.as_str().to_string());
				parsed.primary_exception_lane = Some(Lane::Js);
				parsed.exception_header_line = Some(trimmed.to_string());
				state.saw_top_type = true;
			}
		}
	}

	if !state.saw_top_type {
		if let Some(caps) = p.js_err_line.captures(trimmed) {
			parsed.js_types.push(caps[1].to_string());
			parsed.primary_exception_lane = Some(Lane::Js);
			parsed.exception_header_line = Some(trimmed.to_string());
			state.saw_top_type = true;
		}
	}

	if let Some(caps) = p.java_caused_by.captures(line) {
		parsed.java_types.push(caps[1].to_string());
	}

	if parsed.js_types.is_empty() {
		if let Some(caps) = p.js_err_line.captures(trimmed) {
			parsed.js_types.push(caps[1].to_string());
		}
	}

	if let Some(signal) = p.native_signal.find(trimmed) {
		let signal = signal.as_str().to_string();
		if !parsed.native_types.contains(&signal) {
			parsed.native_types.push(signal);
			if parsed.primary_exception_lane.is_none() {
				parsed.primary_exception_lane = Some(Lane::Native);
			}
		}
	}

	if !state.saw_top_type && !state.react_native_js_exception {
		if let Some(caps) = p.java_top_type.captures(trimmed) {
			parsed.java_types.push(caps[1].to_string());
			parsed.primary_exception_lane = Some(Lane::Java);
			parsed.exception_header_line = Some(trimmed.to_string());
			state.saw_top_type = true;
		}
	}
}

fn parse_u32(s: &str) -> Option<u32> {
	s.parse().ok()
}

fn js_frame(
	function: &str,
	file: &str,
	line: Option<u32>,
	column: Option<u32>,
	raw_line: &str,
	state: &mut ParserState,
) -> Frame {
	Frame::js(
		state.next_position(),
		raw_line,
		JsFrame {
			file: sanitize_js_file(Some(file)),
			function: normalize_js_function(Some(function)),
			line,
			column,
		},
	)
}

fn parse_js_frame(
	p: &Patterns,
	line: &str,
	trimmed: &str,
	state: &mut ParserState,
) -> Option<Frame> {
	if let Some(c) = p.rn_compact_with_col.captures(trimmed) {
		return Some(js_frame(&c[1], &c[2], parse_u32(&c[3]), parse_u32(&c[4]), line, state));
	}
	// Minified bundles put everything on line 1; the number is the column.
	if let Some(c) = p.rn_compact_no_col.captures(trimmed) {
		return Some(js_frame(&c[1], &c[2], Some(1), parse_u32(&c[3]), line, state));
	}
	if let Some(c) = p.js_at_func_file_line_col.captures(line) {
		return Some(js_frame(&c[1], &c[2], parse_u32(&c[3]), parse_u32(&c[4]), line, state));
	}
	if let Some(c) = p.js_at_file_line_col.captures(line) {
		return Some(js_frame(
			"anonymous",
			&c[1],
			parse_u32(&c[2]),
			parse_u32(&c[3]),
			line,
			state,
		));
	}
	None
}

fn parse_java_frame(p: &Patterns, line: &str, state: &mut ParserState) -> Option<Frame> {
	let caps = p.java_at_line.captures(line)?;
	let (class, method) = split_java_class_method(&caps[1]);
	let (file, line_no) = split_java_file_line(&caps[2]);
	Some(Frame::java(
		state.next_position(),
		line,
		JavaFrame {
			class,
			method,
			file,
			line: line_no,
		},
	))
}

fn parse_native_frame(p: &Patterns, line: &str, state: &mut ParserState) -> Option<Frame> {
	let caps = p.native_line.captures(line)?;
	let symbol = caps
		.get(3)
		.map(|m| m.as_str())
		.filter(|s| !s.trim().is_empty())
		.and_then(|s| s.split('+').next())
		.map(str::to_string);
	Some(Frame::native(
		state.next_position(),
		line,
		NativeFrame {
			pc: caps[1].to_string(),
			lib: basename(&caps[2]).to_string(),
			symbol,
		},
	))
}

/// Split `module/pkg.Class.method` into a normalised class and method.
pub fn split_java_class_method(left: &str) -> (String, String) {
	let l = match left.find('/') {
		Some(slash) => &left[slash + 1..],
		None => left,
	};
	match l.rfind('.') {
		Some(dot) if dot > 0 && dot < l.len() - 1 => (
			normalize_java_class(&l[..dot]),
			normalize_java_method(&l[dot + 1..]),
		),
		_ => (l.to_string(), String::new()),
	}
}

/// Split `File.java:12` into file and line.
pub fn split_java_file_line(s: &str) -> (Option<String>, Option<u32>) {
	if s.is_empty() {
		return (None, None);
	}
	match s.find(':') {
		Some(idx) if idx > 0 => (Some(s[..idx].to_string()), parse_u32(&s[idx + 1..])),
		_ => (Some(s.to_string()), None),
	}
}

fn basename(path: &str) -> &str {
	match path.rfind(['/', '\\']) {
		Some(i) => &path[i + 1..],
		None => path,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(raw: &str) -> ParsedFrames {
		parse_stacktrace(Some(raw), &InAppRules::default())
	}

	#[test]
	fn parses_standard_js_trace() {
		let parsed = parse(
			"TypeError: undefined is not a function\n    at renderScreen (app/bundle.js:10:5)\n    at app/bundle.js:20:7",
		);
		assert_eq!(parsed.js_types, vec!["TypeError"]);
		assert_eq!(parsed.primary_exception_lane, Some(Lane::Js));
		assert_eq!(
			parsed.exception_header_line.as_deref(),
			Some("TypeError: undefined is not a function")
		);
		assert_eq!(parsed.js_frames.len(), 2);
		assert_eq!(parsed.js_frames[0].token(), "app/bundle.js#renderScreen");
		assert_eq!(parsed.js_frames[1].token(), "app/bundle.js#anonymous");
		assert_eq!(parsed.js_frames[1].original_position, 1);
		let js = parsed.js_frames[0].as_js().unwrap();
		assert_eq!((js.line, js.column), (Some(10), Some(5)));
	}

	#[test]
	fn parses_react_native_compact_frames() {
		let parsed = parse("Error: boom\nonPress@index.android.bundle:1:4521\nrender@index.android.bundle:9876");
		assert_eq!(parsed.js_frames.len(), 2);
		let second = parsed.js_frames[1].as_js().unwrap();
		assert_eq!(second.line, Some(1));
		assert_eq!(second.column, Some(9876));
	}

	#[test]
	fn parses_java_trace_with_causes() {
		let parsed = parse(
			"java.lang.RuntimeException: Unable to start activity\n\tat com.example.Home$1.lambda$onCreate$0(Home.java:42)\n\tat android.os.Handler.dispatchMessage(Handler.java:106)\nCaused by: java.lang.NullPointerException: oops\n\tat a.b.c(SourceFile:3)",
		);
		assert_eq!(
			parsed.java_types,
			vec!["java.lang.RuntimeException", "java.lang.NullPointerException"]
		);
		assert_eq!(parsed.primary_exception_lane, Some(Lane::Java));
		assert_eq!(parsed.java_frames.len(), 3);
		assert_eq!(parsed.java_frames[0].token(), "com.example.Home#lambda");
		let last = parsed.java_frames[2].as_java().unwrap();
		assert_eq!(last.class, "a.b");
		assert_eq!(last.method, "c");
		assert_eq!(last.file.as_deref(), Some("SourceFile"));
		assert_eq!(last.line, Some(3));
	}

	#[test]
	fn parses_native_frames_and_signals() {
		let parsed = parse(
			"Fatal signal 11 (SIGSEGV), code 1\n#00 pc 000000000001a2b4  /data/app/lib/arm64/libapp.so (crash_handler+20)\n#01 pc 0000000000004000  /system/lib64/libc.so",
		);
		assert_eq!(parsed.native_types, vec!["SIGSEGV"]);
		assert_eq!(parsed.primary_exception_lane, Some(Lane::Native));
		assert_eq!(parsed.native_frames.len(), 2);
		assert_eq!(parsed.native_frames[0].token(), "libapp.so#crash_handler");
		assert_eq!(parsed.native_frames[1].token(), "libc.so#0000000000004000");
	}

	#[test]
	fn mixed_trace_keeps_global_positions() {
		let parsed = parse(
			"com.facebook.react.common.JavascriptException: Error: boom\n    at render (app/bundle.js:1:2)\n\tat com.facebook.react.Bridge.call(Bridge.java:10)\n    at load (app/bundle.js:3:4)",
		);
		assert!(parsed.react_native_js_exception);
		assert_eq!(parsed.primary_exception_lane, Some(Lane::Js));
		assert!(parsed.java_types.is_empty());
		let js_positions: Vec<_> = parsed.js_frames.iter().map(|f| f.original_position).collect();
		assert_eq!(js_positions, vec![0, 2]);
		assert_eq!(parsed.java_frames[0].original_position, 1);
	}

	#[test]
	fn node_modules_frames_are_not_in_app() {
		let parsed = parse(
			"Error: x\n    at a (src/App.js:1:1)\n    at b (node_modules/react/cjs/react.js:2:2)",
		);
		assert!(parsed.js_frames[0].in_app);
		assert!(!parsed.js_frames[1].in_app);
	}

	#[test]
	fn absent_and_blank_traces_are_empty() {
		assert!(parse_stacktrace(None, &InAppRules::default()).is_empty());
		assert!(parse("\n\r\n   \n").is_empty());
	}

	#[test]
	fn splits_java_module_prefix() {
		let (class, method) = split_java_class_method("java.base/java.lang.Thread.run");
		assert_eq!(class, "java.lang.Thread");
		assert_eq!(method, "run");
		// Only the first segment is a module prefix.
		let (class, method) = split_java_class_method("app/loader/com.example.Main.run");
		assert_eq!(class, "loader/com.example.Main");
		assert_eq!(method, "run");
		let (class, method) = split_java_class_method("Main");
		assert_eq!(class, "Main");
		assert_eq!(method, "");
	}
}
