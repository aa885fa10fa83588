// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! VLQ (Variable-Length Quantity) decoder for source map mappings.
//!
//! Source maps use Base64 VLQ encoding for compact storage of line/column
//! mappings. Lookups follow the Closure Compiler consumer: a position before
//! the first segment of its line, or on a line with no segments, resolves to
//! the last segment of the closest preceding line.

use crate::error::{Result, SymbolicateError};

/// Base64 character set used in VLQ encoding.
const BASE64_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

const CONTINUATION_BIT: i64 = 0b10_0000;
const DIGIT_MASK: i64 = 0b01_1111;

/// Decode a Base64 character to its 6-bit value.
fn decode_char(ch: u8) -> Result<i64> {
	BASE64_CHARS
		.iter()
		.position(|&c| c == ch)
		.map(|pos| pos as i64)
		.ok_or(SymbolicateError::InvalidVlqChar(ch as char))
}

/// Decode a VLQ-encoded segment into its signed values.
pub fn decode_vlq_segment(segment: &str) -> Result<Vec<i32>> {
	let mut values = Vec::with_capacity(5);
	let mut value = 0i64;
	let mut shift = 0u32;
	let mut pending = false;

	for ch in segment.bytes() {
		let digit = decode_char(ch)?;
		if shift > 30 {
			return Err(SymbolicateError::VlqOverflow);
		}
		value += (digit & DIGIT_MASK) << shift;
		shift += 5;
		pending = digit & CONTINUATION_BIT != 0;

		if !pending {
			// Lowest bit carries the sign.
			let magnitude = value >> 1;
			let signed = if value & 1 != 0 { -magnitude } else { magnitude };
			values.push(i32::try_from(signed).map_err(|_| SymbolicateError::VlqOverflow)?);
			value = 0;
			shift = 0;
		}
	}

	if pending {
		return Err(SymbolicateError::TruncatedVlq(segment.to_string()));
	}
	Ok(values)
}

/// Original-source half of a segment; absent for 1-field segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginalLocation {
	/// Index into the sources array.
	pub source_index: u32,
	/// Line in the original file (0-indexed).
	pub line: u32,
	/// Column in the original file (0-indexed).
	pub column: u32,
	/// Optional index into the names array.
	pub name_index: Option<u32>,
}

/// A single mapping entry in the decoded source map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
	/// Line in the generated file (0-indexed).
	pub generated_line: u32,
	/// Column in the generated file (0-indexed).
	pub generated_column: u32,
	pub original: Option<OriginalLocation>,
}

/// Container for decoded mappings with efficient lookup.
#[derive(Debug, Clone, Default)]
pub struct DecodedMappings {
	/// Mappings sorted by generated line, then generated column.
	mappings: Vec<Mapping>,
	/// Number of generated lines the mappings string describes.
	line_count: u32,
}

impl DecodedMappings {
	/// Find the mapping for a 0-indexed generated line and column.
	pub fn find(&self, line: u32, column: u32) -> Option<&Mapping> {
		if line >= self.line_count {
			return None;
		}

		let line_start = self.mappings.partition_point(|m| m.generated_line < line);
		let line_end = self.mappings.partition_point(|m| m.generated_line <= line);
		let line_mappings = &self.mappings[line_start..line_end];

		let idx = line_mappings.partition_point(|m| m.generated_column <= column);
		if idx > 0 {
			return Some(&line_mappings[idx - 1]);
		}

		// Last segment of the closest preceding line that has one.
		line_start.checked_sub(1).map(|i| &self.mappings[i])
	}

	pub fn len(&self) -> usize {
		self.mappings.len()
	}

	pub fn is_empty(&self) -> bool {
		self.mappings.is_empty()
	}

	pub fn line_count(&self) -> u32 {
		self.line_count
	}
}

fn non_negative(value: i64, what: &'static str) -> Result<u32> {
	u32::try_from(value).map_err(|_| SymbolicateError::NegativeMappingValue(what))
}

/// Decode a VLQ-encoded source map mappings string into structured form.
///
/// Lines are separated by `;`, segments by `,`, and each segment carries 1,
/// 4 or 5 delta-encoded values.
pub fn decode_vlq_mappings(mappings: &str) -> Result<DecodedMappings> {
	let mut result = DecodedMappings::default();
	let mut generated_line = 0u32;

	let mut prev_source = 0i64;
	let mut prev_original_line = 0i64;
	let mut prev_original_column = 0i64;
	let mut prev_name = 0i64;

	for line in mappings.split(';') {
		let mut generated_column = 0i64;
		let first = result.mappings.len();

		for segment in line.split(',') {
			if segment.is_empty() {
				continue;
			}

			let values = decode_vlq_segment(segment)?;
			let original = match values.len() {
				1 => None,
				4 | 5 => {
					prev_source += i64::from(values[1]);
					prev_original_line += i64::from(values[2]);
					prev_original_column += i64::from(values[3]);
					let name_index = match values.get(4) {
						Some(delta) => {
							prev_name += i64::from(*delta);
							Some(non_negative(prev_name, "name index")?)
						}
						None => None,
					};
					Some(OriginalLocation {
						source_index: non_negative(prev_source, "source index")?,
						line: non_negative(prev_original_line, "original line")?,
						column: non_negative(prev_original_column, "original column")?,
						name_index,
					})
				}
				n => return Err(SymbolicateError::InvalidSegmentLength(n)),
			};

			generated_column += i64::from(values[0]);
			result.mappings.push(Mapping {
				generated_line,
				generated_column: non_negative(generated_column, "generated column")?,
				original,
			});
		}

		result.mappings[first..].sort_by_key(|m| m.generated_column);
		generated_line += 1;
	}

	result.line_count = generated_line;
	Ok(result)
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn mapping(line: u32, column: u32, original_line: u32) -> Mapping {
		Mapping {
			generated_line: line,
			generated_column: column,
			original: Some(OriginalLocation {
				source_index: 0,
				line: original_line,
				column: 0,
				name_index: None,
			}),
		}
	}

	fn encode(value: i32) -> String {
		let mut v = if value < 0 {
			((-(value as i64)) << 1) | 1
		} else {
			(value as i64) << 1
		};
		let mut out = String::new();
		loop {
			let mut digit = v & DIGIT_MASK;
			v >>= 5;
			if v > 0 {
				digit |= CONTINUATION_BIT;
			}
			out.push(BASE64_CHARS[digit as usize] as char);
			if v == 0 {
				return out;
			}
		}
	}

	#[test]
	fn test_decode_vlq_segment_simple() {
		assert_eq!(decode_vlq_segment("A").unwrap(), vec![0]);
		assert_eq!(decode_vlq_segment("C").unwrap(), vec![1]);
		assert_eq!(decode_vlq_segment("D").unwrap(), vec![-1]);
		assert_eq!(decode_vlq_segment("AACA").unwrap(), vec![0, 0, 1, 0]);
	}

	#[test]
	fn test_decode_vlq_segment_continuation() {
		// 'gB' = 16
		assert_eq!(decode_vlq_segment("gB").unwrap(), vec![16]);
	}

	#[test]
	fn test_invalid_and_truncated_segments() {
		assert!(matches!(
			decode_vlq_segment("!"),
			Err(SymbolicateError::InvalidVlqChar('!'))
		));
		assert!(matches!(
			decode_vlq_segment("g"),
			Err(SymbolicateError::TruncatedVlq(_))
		));
		assert!(matches!(
			decode_vlq_segment("gggggggggB"),
			Err(SymbolicateError::VlqOverflow)
		));
	}

	#[test]
	fn test_decode_mappings_multi_line() {
		let result = decode_vlq_mappings("AAAA;AACA").unwrap();
		assert_eq!(result.len(), 2);
		assert_eq!(result.line_count(), 2);

		let second = result.find(1, 0).unwrap();
		assert_eq!(second.generated_line, 1);
		// Original line is relative, so 0 + 1 = 1
		assert_eq!(second.original.unwrap().line, 1);
	}

	#[test]
	fn test_single_field_segment_is_unmapped() {
		let result = decode_vlq_mappings("AAAA,K").unwrap();
		assert_eq!(result.len(), 2);
		assert!(result.find(0, 0).unwrap().original.is_some());
		assert!(result.find(0, 7).unwrap().original.is_none());
	}

	#[test]
	fn test_segment_with_two_fields_is_rejected() {
		assert!(matches!(
			decode_vlq_mappings("AA"),
			Err(SymbolicateError::InvalidSegmentLength(2))
		));
	}

	#[test]
	fn test_find_closest_on_line() {
		let mappings = DecodedMappings {
			mappings: vec![mapping(0, 0, 0), mapping(0, 10, 1), mapping(0, 20, 2)],
			line_count: 1,
		};
		assert_eq!(mappings.find(0, 5).unwrap().generated_column, 0);
		assert_eq!(mappings.find(0, 15).unwrap().generated_column, 10);
		assert_eq!(mappings.find(0, 25).unwrap().generated_column, 20);
	}

	#[test]
	fn test_find_falls_back_to_previous_line() {
		let mappings = DecodedMappings {
			mappings: vec![mapping(0, 0, 0), mapping(0, 8, 1), mapping(3, 6, 9)],
			line_count: 5,
		};
		// Line 2 is empty.
		assert_eq!(mappings.find(2, 0).unwrap().generated_column, 8);
		// Column before the first segment of line 3.
		assert_eq!(mappings.find(3, 2).unwrap().generated_column, 8);
		assert_eq!(mappings.find(3, 7).unwrap().generated_column, 6);
		// Past the last described line.
		assert!(mappings.find(5, 0).is_none());
	}

	#[test]
	fn test_find_before_first_segment_of_first_line() {
		let mappings = DecodedMappings {
			mappings: vec![mapping(0, 4, 0)],
			line_count: 1,
		};
		assert!(mappings.find(0, 3).is_none());
	}

	proptest! {
		#[test]
		fn decodes_what_was_encoded(values in proptest::collection::vec(-1_000_000i32..1_000_000, 1..6)) {
			let segment: String = values.iter().map(|v| encode(*v)).collect();
			prop_assert_eq!(decode_vlq_segment(&segment).unwrap(), values);
		}
	}
}
