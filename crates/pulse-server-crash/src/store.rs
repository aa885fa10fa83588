// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Mapping artifact storage.
//!
//! The store is authoritative for mapping files: one artifact per
//! [`UploadMetadata`] key, last write wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::instrument;

use pulse_crash_core::{ArtifactKind, EventMeta, UploadMetadata};

use crate::error::{CrashServerError, Result};

/// Storage contract for uploaded mapping artifacts.
#[async_trait]
pub trait SymbolFileStore: Send + Sync {
	/// Raw bytes stored under `metadata`, or `None` when nothing was uploaded.
	async fn read_file(&self, metadata: &UploadMetadata) -> Result<Option<Vec<u8>>>;

	/// Insert or replace the artifact stored under `metadata`.
	async fn upload_file(&self, metadata: &UploadMetadata, data: &[u8]) -> Result<()>;

	async fn get_source_map(&self, meta: &EventMeta) -> Result<Option<Vec<u8>>> {
		self.read_file(&meta.upload_metadata(ArtifactKind::SourceMap))
			.await
	}

	async fn get_proguard_map(&self, meta: &EventMeta) -> Result<Option<Vec<u8>>> {
		self.read_file(&meta.upload_metadata(ArtifactKind::ProguardMap))
			.await
	}
}

/// Process-local store, used by the CLI and in tests.
#[derive(Debug, Default)]
pub struct InMemorySymbolFileStore {
	files: RwLock<HashMap<UploadMetadata, Vec<u8>>>,
}

impl InMemorySymbolFileStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.files.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.files.read().is_empty()
	}
}

#[async_trait]
impl SymbolFileStore for InMemorySymbolFileStore {
	async fn read_file(&self, metadata: &UploadMetadata) -> Result<Option<Vec<u8>>> {
		Ok(self.files.read().get(metadata).cloned())
	}

	async fn upload_file(&self, metadata: &UploadMetadata, data: &[u8]) -> Result<()> {
		self.files.write().insert(metadata.clone(), data.to_vec());
		Ok(())
	}
}

/// A stored mapping file with its bookkeeping columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSymbolFile {
	pub metadata: UploadMetadata,
	pub data: Vec<u8>,
	pub size_bytes: u64,
	pub sha256: String,
	pub uploaded_at: DateTime<Utc>,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS symbol_files (
	app_version TEXT NOT NULL,
	app_version_code TEXT NOT NULL,
	platform TEXT NOT NULL,
	framework TEXT NOT NULL,
	file_content BLOB NOT NULL,
	size_bytes INTEGER NOT NULL,
	sha256 TEXT NOT NULL,
	uploaded_at TEXT NOT NULL,
	PRIMARY KEY (app_version, app_version_code, platform, framework)
)
"#;

/// SQLite implementation of the mapping artifact store.
#[derive(Clone)]
pub struct SqliteSymbolFileStore {
	pool: SqlitePool,
}

impl SqliteSymbolFileStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Create the `symbol_files` table if it does not exist.
	pub async fn ensure_schema(&self) -> Result<()> {
		sqlx::query(SCHEMA).execute(&self.pool).await?;
		Ok(())
	}

	#[instrument(skip(self), fields(key = %metadata))]
	pub async fn get_symbol_file(
		&self,
		metadata: &UploadMetadata,
	) -> Result<Option<StoredSymbolFile>> {
		let row = sqlx::query_as::<_, SymbolFileRow>(
			r#"
			SELECT app_version, app_version_code, platform, framework,
				   file_content, size_bytes, sha256, uploaded_at
			FROM symbol_files
			WHERE app_version = ? AND app_version_code = ? AND platform = ? AND framework = ?
			"#,
		)
		.bind(&metadata.app_version)
		.bind(&metadata.version_code)
		.bind(&metadata.platform)
		.bind(metadata.kind.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}
}

#[async_trait]
impl SymbolFileStore for SqliteSymbolFileStore {
	#[instrument(skip(self), fields(key = %metadata))]
	async fn read_file(&self, metadata: &UploadMetadata) -> Result<Option<Vec<u8>>> {
		Ok(self.get_symbol_file(metadata).await?.map(|file| file.data))
	}

	#[instrument(skip(self, data), fields(key = %metadata, size_bytes = data.len()))]
	async fn upload_file(&self, metadata: &UploadMetadata, data: &[u8]) -> Result<()> {
		let sha256 = hex::encode(Sha256::digest(data));

		sqlx::query(
			r#"
			INSERT INTO symbol_files (
				app_version, app_version_code, platform, framework,
				file_content, size_bytes, sha256, uploaded_at
			)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?)
			ON CONFLICT (app_version, app_version_code, platform, framework) DO UPDATE SET
				file_content = excluded.file_content,
				size_bytes = excluded.size_bytes,
				sha256 = excluded.sha256,
				uploaded_at = excluded.uploaded_at
			"#,
		)
		.bind(&metadata.app_version)
		.bind(&metadata.version_code)
		.bind(&metadata.platform)
		.bind(metadata.kind.to_string())
		.bind(data)
		.bind(data.len() as i64)
		.bind(sha256)
		.bind(Utc::now().to_rfc3339())
		.execute(&self.pool)
		.await?;

		Ok(())
	}
}

#[derive(sqlx::FromRow)]
struct SymbolFileRow {
	app_version: String,
	app_version_code: String,
	platform: String,
	framework: String,
	file_content: Vec<u8>,
	size_bytes: i64,
	sha256: String,
	uploaded_at: String,
}

impl TryFrom<SymbolFileRow> for StoredSymbolFile {
	type Error = CrashServerError;

	fn try_from(row: SymbolFileRow) -> Result<Self> {
		Ok(StoredSymbolFile {
			metadata: UploadMetadata {
				app_version: row.app_version,
				version_code: row.app_version_code,
				platform: row.platform,
				kind: row.framework.parse().map_err(|_| {
					CrashServerError::Parse(format!("invalid framework: {}", row.framework))
				})?,
			},
			data: row.file_content,
			size_bytes: row.size_bytes as u64,
			sha256: row.sha256,
			uploaded_at: parse_datetime(&row.uploaded_at)?,
		})
	}
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(s)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|_| CrashServerError::InvalidDateTime(s.to_string()))
}
