// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event and mapping-artifact metadata.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CrashError;
use crate::frame::Lane;

/// Identifies the build that produced an event.
///
/// Missing values are carried as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMeta {
	#[serde(default)]
	pub platform: String,
	#[serde(default)]
	pub app_version: String,
	#[serde(default)]
	pub app_version_code: String,
}

impl EventMeta {
	pub fn new(
		platform: impl Into<String>,
		app_version: impl Into<String>,
		app_version_code: impl Into<String>,
	) -> Self {
		Self {
			platform: platform.into(),
			app_version: app_version.into(),
			app_version_code: app_version_code.into(),
		}
	}

	/// Presence cache key: `platform:appVersion:LANE`.
	pub fn presence_key(&self, lane: Lane) -> String {
		format!("{}:{}:{}", self.platform, self.app_version, lane)
	}

	/// Store key for this build's mapping artifact of the given kind.
	pub fn upload_metadata(&self, kind: ArtifactKind) -> UploadMetadata {
		UploadMetadata {
			app_version: self.app_version.clone(),
			version_code: self.app_version_code.clone(),
			platform: self.platform.clone(),
			kind,
		}
	}
}

/// Kind of mapping artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
	/// JavaScript source map.
	#[serde(rename = "JS")]
	SourceMap,
	/// ProGuard / R8 mapping file.
	#[serde(rename = "JAVA")]
	ProguardMap,
}

impl fmt::Display for ArtifactKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::SourceMap => write!(f, "JS"),
			Self::ProguardMap => write!(f, "JAVA"),
		}
	}
}

impl FromStr for ArtifactKind {
	type Err = CrashError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"JS" => Ok(Self::SourceMap),
			"JAVA" => Ok(Self::ProguardMap),
			_ => Err(CrashError::InvalidArtifactKind(s.to_string())),
		}
	}
}

/// Key of a mapping artifact in the store. One artifact per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
	#[serde(default)]
	pub app_version: String,
	#[serde(default)]
	pub version_code: String,
	#[serde(default)]
	pub platform: String,
	#[serde(rename = "type")]
	pub kind: ArtifactKind,
}

impl fmt::Display for UploadMetadata {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}/{}({})/{}",
			self.platform, self.app_version, self.version_code, self.kind
		)
	}
}
