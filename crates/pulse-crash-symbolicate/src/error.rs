// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for symbolication operations.

use thiserror::Error;

/// Errors that can occur while loading or querying mapping artifacts.
#[derive(Debug, Error)]
pub enum SymbolicateError {
	#[error("Invalid source map JSON: {0}")]
	InvalidSourceMapJson(#[from] serde_json::Error),

	#[error("Invalid source map version: expected 3, got {0}")]
	InvalidSourceMapVersion(u32),

	#[error("Invalid VLQ character: {0}")]
	InvalidVlqChar(char),

	#[error("VLQ value overflows 32 bits")]
	VlqOverflow,

	#[error("Truncated VLQ segment: {0}")]
	TruncatedVlq(String),

	#[error("Invalid mapping segment with {0} fields")]
	InvalidSegmentLength(usize),

	#[error("Negative {0} in source map mappings")]
	NegativeMappingValue(&'static str),

	#[error("Invalid source index: {0}")]
	InvalidSourceIndex(u32),

	#[error("Invalid name index: {0}")]
	InvalidNameIndex(u32),

	#[error("Mapping file is not valid UTF-8")]
	InvalidUtf8(#[from] std::str::Utf8Error),

	#[error("Invalid ProGuard mapping at line {line}: {content}")]
	InvalidProguardLine { line: usize, content: String },
}

pub type Result<T> = std::result::Result<T, SymbolicateError>;
