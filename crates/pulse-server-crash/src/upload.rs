// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Multi-file mapping upload.
//!
//! A client uploads several mapping files in one request together with a JSON
//! list describing each file. Files are paired with their description by file
//! name.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use pulse_crash_core::UploadMetadata;

use crate::store::SymbolFileStore;

/// One uploaded file part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
	pub file_name: Option<String>,
	pub data: Vec<u8>,
}

/// Description of one file in the upload's JSON payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadEntry {
	pub file_name: String,
	#[serde(flatten)]
	pub metadata: UploadMetadata,
}

/// Pairs uploaded files with their metadata and writes them to the store.
pub struct SymbolFileService<S: SymbolFileStore + 'static> {
	store: Arc<S>,
}

impl<S: SymbolFileStore + 'static> SymbolFileService<S> {
	pub fn new(store: Arc<S>) -> Self {
		Self { store }
	}

	/// Upload every file that has a matching entry.
	///
	/// The first entry for a file name wins. Files without a name or without
	/// an entry are skipped. Returns `false` when no file was supplied or any
	/// upload failed.
	#[instrument(skip_all, fields(files = files.len(), entries = entries.len()))]
	pub async fn upload_files(&self, files: Vec<UploadedFile>, entries: Vec<UploadEntry>) -> bool {
		if files.is_empty() {
			warn!("Upload rejected: no file parts supplied");
			return false;
		}

		let mut by_name: HashMap<String, UploadMetadata> = HashMap::new();
		for entry in entries {
			by_name.entry(entry.file_name).or_insert(entry.metadata);
		}

		let mut uploads = Vec::new();
		for file in &files {
			let name = match file.file_name.as_deref().map(str::trim) {
				Some(name) if !name.is_empty() => name,
				_ => {
					warn!("Skipping file part with unknown filename");
					continue;
				}
			};
			let Some(metadata) = by_name.get(name) else {
				warn!(file_name = %name, "Skipping file: no matching metadata entry");
				continue;
			};
			uploads.push(self.upload_one(name, metadata, &file.data));
		}

		join_all(uploads).await.into_iter().all(|ok| ok)
	}

	async fn upload_one(&self, name: &str, metadata: &UploadMetadata, data: &[u8]) -> bool {
		match self.store.upload_file(metadata, data).await {
			Ok(()) => {
				info!(
					file_name = %name,
					key = %metadata,
					size_bytes = data.len(),
					"Uploaded mapping file"
				);
				true
			}
			Err(e) => {
				warn!(
					file_name = %name,
					key = %metadata,
					error = %e,
					"Failed to store mapping file"
				);
				false
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::{CrashServerError, Result};
	use crate::store::InMemorySymbolFileStore;
	use async_trait::async_trait;
	use pulse_crash_core::{ArtifactKind, EventMeta};

	fn entry(file_name: &str, version: &str, kind: ArtifactKind) -> UploadEntry {
		UploadEntry {
			file_name: file_name.to_string(),
			metadata: EventMeta::new("android", version, "1").upload_metadata(kind),
		}
	}

	fn file(name: Option<&str>, data: &[u8]) -> UploadedFile {
		UploadedFile {
			file_name: name.map(str::to_string),
			data: data.to_vec(),
		}
	}

	#[test]
	fn entry_deserializes_flat_json() {
		let json = r#"{"fileName":"mapping.txt","appVersion":"1.0","versionCode":"10","platform":"android","type":"JAVA"}"#;
		let parsed: UploadEntry = serde_json::from_str(json).unwrap();
		assert_eq!(parsed.file_name, "mapping.txt");
		assert_eq!(parsed.metadata.kind, ArtifactKind::ProguardMap);
	}

	#[tokio::test]
	async fn uploads_matched_files() {
		let store = Arc::new(InMemorySymbolFileStore::new());
		let service = SymbolFileService::new(store.clone());

		let ok = service
			.upload_files(
				vec![
					file(Some("index.map"), b"{}"),
					file(Some("mapping.txt"), b"a -> b:"),
					file(Some("orphan.txt"), b"x"),
					file(None, b"y"),
				],
				vec![
					entry("index.map", "1.0", ArtifactKind::SourceMap),
					entry("mapping.txt", "1.0", ArtifactKind::ProguardMap),
				],
			)
			.await;

		assert!(ok);
		assert_eq!(store.len(), 2);
	}

	#[tokio::test]
	async fn first_entry_for_a_name_wins() {
		let store = Arc::new(InMemorySymbolFileStore::new());
		let service = SymbolFileService::new(store.clone());

		service
			.upload_files(
				vec![file(Some("index.map"), b"{}")],
				vec![
					entry("index.map", "1.0", ArtifactKind::SourceMap),
					entry("index.map", "2.0", ArtifactKind::SourceMap),
				],
			)
			.await;

		let first = EventMeta::new("android", "1.0", "1").upload_metadata(ArtifactKind::SourceMap);
		assert!(store.read_file(&first).await.unwrap().is_some());
		assert_eq!(store.len(), 1);
	}

	#[tokio::test]
	async fn empty_upload_is_rejected() {
		let service = SymbolFileService::new(Arc::new(InMemorySymbolFileStore::new()));
		assert!(!service.upload_files(Vec::new(), Vec::new()).await);
	}

	struct FailingStore;

	#[async_trait]
	impl SymbolFileStore for FailingStore {
		async fn read_file(&self, _metadata: &UploadMetadata) -> Result<Option<Vec<u8>>> {
			Ok(None)
		}

		async fn upload_file(&self, _metadata: &UploadMetadata, _data: &[u8]) -> Result<()> {
			Err(CrashServerError::Parse("disk full".to_string()))
		}
	}

	#[tokio::test]
	async fn store_failure_reports_false() {
		let service = SymbolFileService::new(Arc::new(FailingStore));
		let ok = service
			.upload_files(
				vec![file(Some("index.map"), b"{}")],
				vec![entry("index.map", "1.0", ArtifactKind::SourceMap)],
			)
			.await;
		assert!(!ok);
	}
}
