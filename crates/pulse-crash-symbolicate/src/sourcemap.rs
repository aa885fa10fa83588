// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Source map parsing and position lookup.
//!
//! Implements the Source Map v3 format for JavaScript / React Native bundles.
//! Positions are taken as they appear in stack traces: both line and column
//! are 1-indexed.

use serde::Deserialize;

use crate::error::{Result, SymbolicateError};
use crate::vlq::{decode_vlq_mappings, DecodedMappings};

/// Raw source map JSON structure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSourceMap {
	version: u32,
	#[serde(default)]
	file: Option<String>,
	#[serde(default)]
	source_root: Option<String>,
	#[serde(default)]
	sources: Vec<Option<String>>,
	#[serde(default)]
	names: Vec<String>,
	mappings: String,
}

/// Parsed source map ready for lookups.
#[derive(Debug, Clone)]
pub struct ParsedSourceMap {
	/// Generated file name.
	pub file: Option<String>,
	/// Root path prepended to source filenames.
	pub source_root: Option<String>,
	/// Original source file paths.
	pub sources: Vec<String>,
	/// Original identifiers (function/variable names).
	pub names: Vec<String>,
	mappings: DecodedMappings,
}

/// Original position information from a source map lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalPosition {
	/// Original source file path, with the source root applied.
	pub source: String,
	/// Line in the original source (1-indexed).
	pub line: u32,
	/// Column in the original source (1-indexed).
	pub column: u32,
	/// Original identifier name if the segment carries one.
	pub name: Option<String>,
}

impl ParsedSourceMap {
	/// Parse a source map from JSON bytes.
	pub fn from_bytes(data: &[u8]) -> Result<Self> {
		let raw: RawSourceMap = serde_json::from_slice(data)?;

		if raw.version != 3 {
			return Err(SymbolicateError::InvalidSourceMapVersion(raw.version));
		}

		let mappings = decode_vlq_mappings(&raw.mappings)?;
		tracing::debug!(
			sources = raw.sources.len(),
			names = raw.names.len(),
			mappings = mappings.len(),
			"parsed source map"
		);

		Ok(Self {
			file: raw.file,
			source_root: raw.source_root,
			sources: raw.sources.into_iter().map(Option::unwrap_or_default).collect(),
			names: raw.names,
			mappings,
		})
	}

	/// Lookup the original position for a 1-indexed generated line and column.
	///
	/// Returns `None` when the position lies outside the mapped range or
	/// resolves to a segment without original-source information.
	pub fn lookup(&self, line: u32, column: u32) -> Result<Option<OriginalPosition>> {
		if line == 0 {
			return Ok(None);
		}

		let Some(mapping) = self.mappings.find(line - 1, column.saturating_sub(1)) else {
			return Ok(None);
		};
		let Some(original) = mapping.original else {
			return Ok(None);
		};

		let source = self
			.sources
			.get(original.source_index as usize)
			.ok_or(SymbolicateError::InvalidSourceIndex(original.source_index))?;

		let name = match original.name_index {
			Some(idx) => Some(
				self.names
					.get(idx as usize)
					.ok_or(SymbolicateError::InvalidNameIndex(idx))?
					.clone(),
			),
			None => None,
		};

		Ok(Some(OriginalPosition {
			source: self.resolve_source_path(source),
			line: original.line + 1,
			column: original.column + 1,
			name,
		}))
	}

	/// Resolve a source path with the source root if present.
	fn resolve_source_path(&self, source: &str) -> String {
		match &self.source_root {
			Some(root) if !root.is_empty() => {
				let root = root.trim_end_matches('/');
				format!("{}/{}", root, source)
			}
			_ => source.to_string(),
		}
	}

	pub fn source_count(&self) -> usize {
		self.sources.len()
	}

	pub fn mapping_count(&self) -> usize {
		self.mappings.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn home_screen_map() -> &'static str {
		r#"{
			"version": 3,
			"file": "index.android.bundle",
			"sources": ["src/screens/Home.tsx"],
			"names": ["renderScreen"],
			"mappings": ";;;;;;;;;IAAAA"
		}"#
	}

	#[test]
	fn test_parse_source_map() {
		let sm = ParsedSourceMap::from_bytes(home_screen_map().as_bytes()).unwrap();
		assert_eq!(sm.file.as_deref(), Some("index.android.bundle"));
		assert_eq!(sm.sources, vec!["src/screens/Home.tsx"]);
		assert_eq!(sm.names, vec!["renderScreen"]);
		assert_eq!(sm.mapping_count(), 1);
	}

	#[test]
	fn test_lookup_uses_one_based_positions() {
		let sm = ParsedSourceMap::from_bytes(home_screen_map().as_bytes()).unwrap();
		let pos = sm.lookup(10, 5).unwrap().unwrap();
		assert_eq!(pos.source, "src/screens/Home.tsx");
		assert_eq!(pos.name.as_deref(), Some("renderScreen"));
		assert_eq!(pos.line, 1);
		assert_eq!(pos.column, 1);
	}

	#[test]
	fn test_lookup_outside_mapped_lines() {
		let json = r#"{"version": 3, "sources": ["a.ts"], "names": [], "mappings": "AAAA"}"#;
		let sm = ParsedSourceMap::from_bytes(json.as_bytes()).unwrap();
		assert!(sm.lookup(10, 5).unwrap().is_none());
		assert!(sm.lookup(0, 1).unwrap().is_none());
		let pos = sm.lookup(1, 1).unwrap().unwrap();
		assert_eq!(pos.name, None);
	}

	#[test]
	fn test_invalid_version() {
		let json = r#"{"version": 2, "sources": [], "names": [], "mappings": ""}"#;
		assert!(matches!(
			ParsedSourceMap::from_bytes(json.as_bytes()),
			Err(SymbolicateError::InvalidSourceMapVersion(2))
		));
	}

	#[test]
	fn test_invalid_json() {
		assert!(matches!(
			ParsedSourceMap::from_bytes(b"not json"),
			Err(SymbolicateError::InvalidSourceMapJson(_))
		));
	}

	#[test]
	fn test_out_of_range_indices_are_errors() {
		let json = r#"{"version": 3, "sources": [], "names": [], "mappings": "AAAA"}"#;
		let sm = ParsedSourceMap::from_bytes(json.as_bytes()).unwrap();
		assert!(matches!(
			sm.lookup(1, 1),
			Err(SymbolicateError::InvalidSourceIndex(0))
		));

		let json = r#"{"version": 3, "sources": ["a.ts"], "names": [], "mappings": "AAAAA"}"#;
		let sm = ParsedSourceMap::from_bytes(json.as_bytes()).unwrap();
		assert!(matches!(sm.lookup(1, 1), Err(SymbolicateError::InvalidNameIndex(0))));
	}

	#[test]
	fn test_source_root_resolution() {
		let json = r#"{
			"version": 3,
			"sourceRoot": "src/",
			"sources": ["index.ts"],
			"names": [],
			"mappings": "AAAA"
		}"#;
		let sm = ParsedSourceMap::from_bytes(json.as_bytes()).unwrap();
		let pos = sm.lookup(1, 1).unwrap().unwrap();
		assert_eq!(pos.source, "src/index.ts");
	}
}
