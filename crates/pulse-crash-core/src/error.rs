// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the error grouping core.

use thiserror::Error;

/// Errors that can occur while handling crash core types.
#[derive(Debug, Error)]
pub enum CrashError {
	#[error("invalid lane: {0}")]
	InvalidLane(String),

	#[error("invalid artifact kind: {0}")]
	InvalidArtifactKind(String),
}

/// Result type for crash core operations.
pub type Result<T> = std::result::Result<T, CrashError>;
