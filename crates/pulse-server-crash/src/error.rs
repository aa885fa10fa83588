// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for symbolication and grouping services.

use pulse_crash_core::UploadMetadata;
use thiserror::Error;

/// Errors that can occur in store and ingestion operations.
#[derive(Debug, Error)]
pub enum CrashServerError {
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("invalid datetime: {0}")]
	InvalidDateTime(String),

	#[error("parse error: {0}")]
	Parse(String),

	#[error("sink error: {0}")]
	Sink(String),
}

/// Result type for store and ingestion operations.
pub type Result<T> = std::result::Result<T, CrashServerError>;

/// Why a lane could not be symbolicated.
///
/// The symbolicator never surfaces these to callers. Every variant is logged,
/// recorded as a negative presence entry and degrades to unresolved tokens.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
	#[error("no mapping artifact uploaded for {metadata}")]
	ArtifactNotFound { metadata: UploadMetadata },

	#[error("failed to fetch mapping artifact {metadata}: {message}")]
	ArtifactFetchFailed {
		metadata: UploadMetadata,
		message: String,
	},

	#[error("resolution failed: {0}")]
	ResolutionFailed(String),
}

impl ResolveError {
	/// Short failure kind for structured logs.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::ArtifactNotFound { .. } => "artifact_not_found",
			Self::ArtifactFetchFailed { .. } => "artifact_fetch_failed",
			Self::ResolutionFailed(_) => "resolution_failed",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pulse_crash_core::{ArtifactKind, EventMeta};

	#[test]
	fn resolve_error_kinds() {
		let metadata =
			EventMeta::new("android", "1.0", "10").upload_metadata(ArtifactKind::SourceMap);
		assert_eq!(
			ResolveError::ArtifactNotFound {
				metadata: metadata.clone()
			}
			.kind(),
			"artifact_not_found"
		);
		let err = ResolveError::ArtifactFetchFailed {
			metadata,
			message: "timed out".to_string(),
		};
		assert_eq!(err.kind(), "artifact_fetch_failed");
		assert_eq!(
			err.to_string(),
			"failed to fetch mapping artifact android/1.0(10)/JS: timed out"
		);
		assert_eq!(
			ResolveError::ResolutionFailed("bad line".to_string()).kind(),
			"resolution_failed"
		);
	}
}
