// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! ProGuard / R8 mapping files and JVM stack frame retracing.
//!
//! Loading a mapping only indexes the class headers
//! (`com.example.Home -> a.b:`). The member lines of a class are parsed the
//! first time a frame references that class and memoised afterwards, so a
//! large mapping costs little more than one scan until it is used.
//!
//! Member lines have the form
//!
//! ```text
//!     [a:b:]returnType [origClass.]name(args)[:c[:d]] -> obf
//! ```
//!
//! Several members sharing the same minified range `a:b` form an inline
//! chain: the first line is the innermost inlined call and the last is the
//! outer method, so one obfuscated frame expands into several.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::OnceLock;

use pulse_crash_core::JavaFrame;
use serde::Deserialize;

use crate::error::{Result, SymbolicateError};

/// A parsed ProGuard / R8 mapping file.
#[derive(Debug)]
pub struct ProguardMapping {
	text: String,
	/// Class sections keyed by obfuscated class name.
	classes: HashMap<String, ClassSection>,
}

#[derive(Debug)]
struct ClassSection {
	original: String,
	/// 1-based line number of the first body line.
	first_body_line: usize,
	body: Range<usize>,
	members: OnceLock<std::result::Result<ClassMembers, MalformedLine>>,
}

#[derive(Debug, Clone)]
struct MalformedLine {
	line: usize,
	content: String,
}

impl From<&MalformedLine> for SymbolicateError {
	fn from(e: &MalformedLine) -> Self {
		SymbolicateError::InvalidProguardLine {
			line: e.line,
			content: e.content.clone(),
		}
	}
}

#[derive(Debug, Default)]
struct ClassMembers {
	source_file: Option<String>,
	methods: HashMap<String, Vec<MemberMapping>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MemberMapping {
	minified: Option<(u32, u32)>,
	/// Set when the method was inlined from another class.
	original_class: Option<String>,
	original_name: String,
	original: Option<(u32, Option<u32>)>,
}

impl MemberMapping {
	fn covers(&self, line: u32) -> bool {
		self.minified.is_some_and(|(a, b)| a <= line && line <= b)
	}

	fn original_line(&self, line: Option<u32>) -> Option<u32> {
		match (self.minified, self.original, line) {
			(Some((a, _)), Some((c, Some(d))), Some(l)) if self.covers(l) => {
				Some(c.saturating_add(l - a).min(d))
			}
			(Some(_), None, Some(l)) if self.covers(l) => Some(l),
			(_, Some((c, _)), _) => Some(c),
			(_, None, l) => l,
		}
	}
}

enum MemberLine {
	Method(String, MemberMapping),
	Field,
}

#[derive(Deserialize)]
struct MappingComment {
	id: String,
	#[serde(rename = "fileName")]
	file_name: Option<String>,
}

/// Obfuscated frame as it appears on a JVM stack line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObfuscatedFrame<'a> {
	pub class: &'a str,
	pub method: &'a str,
	pub file: Option<&'a str>,
	pub line: Option<u32>,
}

/// Result of retracing one stack line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retraced {
	/// Not a frame line, or a class the mapping does not know.
	Unchanged,
	/// De-obfuscated frames, innermost first.
	Frames(Vec<JavaFrame>),
}

impl ProguardMapping {
	/// Index a mapping file. Only class headers are validated here.
	pub fn parse(data: &[u8]) -> Result<Self> {
		let text = std::str::from_utf8(data)?.to_string();
		let mut classes = HashMap::new();
		let mut open: Option<(String, String, usize, usize)> = None;
		let mut offset = 0;

		for (idx, raw) in text.split_inclusive('\n').enumerate() {
			let start = offset;
			offset += raw.len();
			let line = raw.trim_end_matches(['\n', '\r']);
			if line.trim().is_empty()
				|| line.starts_with(char::is_whitespace)
				|| line.starts_with('#')
			{
				continue;
			}

			let (original, obfuscated) =
				parse_class_header(line).ok_or_else(|| SymbolicateError::InvalidProguardLine {
					line: idx + 1,
					content: line.to_string(),
				})?;

			if let Some((obf, orig, first_line, body_start)) = open.take() {
				insert_class(&mut classes, obf, orig, first_line, body_start..start);
			}
			open = Some((obfuscated, original, idx + 2, offset));
		}

		if let Some((obf, orig, first_line, body_start)) = open {
			insert_class(&mut classes, obf, orig, first_line, body_start..offset);
		}

		tracing::debug!(classes = classes.len(), bytes = text.len(), "indexed proguard mapping");
		Ok(Self { text, classes })
	}

	pub fn class_count(&self) -> usize {
		self.classes.len()
	}

	/// Number of classes whose member sections have been parsed.
	pub fn materialized_class_count(&self) -> usize {
		self.classes.values().filter(|c| c.members.get().is_some()).count()
	}

	pub fn original_class_name(&self, obfuscated: &str) -> Option<&str> {
		self.classes.get(obfuscated).map(|c| c.original.as_str())
	}

	/// Retrace one raw stack line.
	pub fn retrace_line(&self, raw: &str) -> Result<Retraced> {
		match parse_frame_line(raw) {
			Some(frame) => self.remap_frame(&frame),
			None => Ok(Retraced::Unchanged),
		}
	}

	/// Map an obfuscated frame back to its original frames.
	pub fn remap_frame(&self, frame: &ObfuscatedFrame<'_>) -> Result<Retraced> {
		let Some(section) = self.classes.get(frame.class) else {
			return Ok(Retraced::Unchanged);
		};
		let members = section.members(&self.text)?;
		let class_file = members
			.source_file
			.clone()
			.unwrap_or_else(|| synthesize_source_file(&section.original));

		let candidates = members
			.methods
			.get(frame.method)
			.map(Vec::as_slice)
			.unwrap_or_default();
		let selected = select_members(candidates, frame.line);

		if selected.is_empty() {
			return Ok(Retraced::Frames(vec![JavaFrame {
				class: section.original.clone(),
				method: frame.method.to_string(),
				file: Some(class_file),
				line: frame.line,
			}]));
		}

		let frames = selected
			.into_iter()
			.map(|m| match &m.original_class {
				Some(class) => JavaFrame {
					class: class.clone(),
					method: m.original_name.clone(),
					file: Some(synthesize_source_file(class)),
					line: m.original_line(frame.line),
				},
				None => JavaFrame {
					class: section.original.clone(),
					method: m.original_name.clone(),
					file: Some(class_file.clone()),
					line: m.original_line(frame.line),
				},
			})
			.collect();
		Ok(Retraced::Frames(frames))
	}
}

impl ClassSection {
	fn members<'a>(&'a self, text: &str) -> Result<&'a ClassMembers> {
		self.members
			.get_or_init(|| parse_members(&text[self.body.clone()], self.first_body_line))
			.as_ref()
			.map_err(SymbolicateError::from)
	}
}

fn insert_class(
	classes: &mut HashMap<String, ClassSection>,
	obfuscated: String,
	original: String,
	first_body_line: usize,
	body: Range<usize>,
) {
	classes.entry(obfuscated).or_insert(ClassSection {
		original,
		first_body_line,
		body,
		members: OnceLock::new(),
	});
}

fn parse_class_header(line: &str) -> Option<(String, String)> {
	let (original, obfuscated) = line.trim_end().strip_suffix(':')?.split_once(" -> ")?;
	let (original, obfuscated) = (original.trim(), obfuscated.trim());
	if original.is_empty() || obfuscated.is_empty() || original.contains(char::is_whitespace) {
		return None;
	}
	Some((original.to_string(), obfuscated.to_string()))
}

fn parse_members(
	body: &str,
	first_line: usize,
) -> std::result::Result<ClassMembers, MalformedLine> {
	let mut members = ClassMembers::default();
	let mut seen_member = false;

	for (i, raw) in body.lines().enumerate() {
		let line = raw.trim();
		if line.is_empty() {
			continue;
		}
		if let Some(comment) = line.strip_prefix('#') {
			// Only comments ahead of the first member describe the class.
			if !seen_member && members.source_file.is_none() {
				members.source_file = parse_source_file_comment(comment);
			}
			continue;
		}

		seen_member = true;
		match parse_member_line(line) {
			Some(MemberLine::Method(obfuscated, mapping)) => {
				members.methods.entry(obfuscated).or_default().push(mapping);
			}
			Some(MemberLine::Field) => {}
			None => {
				return Err(MalformedLine {
					line: first_line + i,
					content: line.to_string(),
				})
			}
		}
	}
	Ok(members)
}

fn parse_source_file_comment(comment: &str) -> Option<String> {
	let parsed: MappingComment = serde_json::from_str(comment.trim()).ok()?;
	(parsed.id == "sourceFile").then_some(parsed.file_name).flatten()
}

fn parse_member_line(line: &str) -> Option<MemberLine> {
	let (lhs, obfuscated) = line.rsplit_once(" -> ")?;
	let obfuscated = obfuscated.trim();
	if obfuscated.is_empty() {
		return None;
	}

	let Some(open) = lhs.find('(') else {
		return (lhs.split_whitespace().count() == 2).then_some(MemberLine::Field);
	};
	let close = lhs.rfind(')').filter(|close| *close > open)?;

	let (minified, signature) = split_minified_range(&lhs[..open])?;
	let mut parts = signature.split_whitespace();
	let _return_type = parts.next()?;
	let qualified = parts.next()?;
	if parts.next().is_some() {
		return None;
	}
	let (original_class, original_name) = match qualified.rsplit_once('.') {
		Some((class, name)) => (Some(class.to_string()), name.to_string()),
		None => (None, qualified.to_string()),
	};
	let original = parse_original_range(&lhs[close + 1..])?;

	Some(MemberLine::Method(
		obfuscated.to_string(),
		MemberMapping {
			minified,
			original_class,
			original_name,
			original,
		},
	))
}

fn split_minified_range(head: &str) -> Option<(Option<(u32, u32)>, &str)> {
	if !head.starts_with(|c: char| c.is_ascii_digit()) {
		return Some((None, head));
	}
	let (a, rest) = head.split_once(':')?;
	let (b, rest) = rest.split_once(':')?;
	Some((Some((a.parse().ok()?, b.parse().ok()?)), rest))
}

/// `""`, `":c"` or `":c:d"`; the outer `None` marks a malformed suffix.
fn parse_original_range(tail: &str) -> Option<Option<(u32, Option<u32>)>> {
	let tail = tail.trim();
	if tail.is_empty() {
		return Some(None);
	}
	let mut parts = tail.strip_prefix(':')?.split(':');
	let c: u32 = parts.next()?.parse().ok()?;
	let d = match parts.next() {
		Some(d) => Some(d.parse().ok()?),
		None => None,
	};
	if parts.next().is_some() {
		return None;
	}
	Some(Some((c, d)))
}

fn select_members(candidates: &[MemberMapping], line: Option<u32>) -> Vec<&MemberMapping> {
	if let Some(line) = line {
		if let Some(first) = candidates.iter().find(|m| m.covers(line)) {
			return candidates.iter().filter(|m| m.minified == first.minified).collect();
		}
	}
	candidates
		.iter()
		.find(|m| m.minified.is_none())
		.or_else(|| candidates.first())
		.into_iter()
		.collect()
}

/// `com.example.Home$Inner` -> `Home.java`
fn synthesize_source_file(class: &str) -> String {
	let simple = class.rsplit('.').next().unwrap_or(class);
	let outer = simple.split('$').next().unwrap_or(simple);
	format!("{outer}.java")
}

/// Parse `at cls.method(File:line)`, dropping any `module/` prefix.
pub fn parse_frame_line(raw: &str) -> Option<ObfuscatedFrame<'_>> {
	let rest = raw.trim().strip_prefix("at")?;
	if !rest.starts_with(char::is_whitespace) {
		return None;
	}
	let rest = rest.trim_start();
	let open = rest.find('(')?;
	let close = rest.rfind(')').filter(|close| *close > open)?;

	let qualified = &rest[..open];
	let qualified = qualified.rsplit_once('/').map_or(qualified, |(_, q)| q);
	let (class, method) = qualified.rsplit_once('.')?;
	if class.is_empty() || method.is_empty() {
		return None;
	}

	let location = rest[open + 1..close].trim();
	let (file, line) = match location.rsplit_once(':') {
		Some((file, n)) => match n.parse() {
			Ok(n) => (file, Some(n)),
			Err(_) => (location, None),
		},
		None => (location, None),
	};

	Some(ObfuscatedFrame {
		class,
		method,
		file: (!file.is_empty()).then_some(file),
		line,
	})
}

/// Render a frame as a JVM stack line.
pub fn render_java_frame(frame: &JavaFrame) -> String {
	let target = if frame.method.is_empty() {
		frame.class.clone()
	} else {
		format!("{}.{}", frame.class, frame.method)
	};
	match (&frame.file, frame.line) {
		(Some(file), Some(line)) => format!("at {target}({file}:{line})"),
		(Some(file), None) => format!("at {target}({file})"),
		(None, Some(line)) => format!("at {target}(Unknown Source:{line})"),
		(None, None) => format!("at {target}(Unknown Source)"),
	}
}
