// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cache of parsed mapping artifacts.
//!
//! Raw bytes come from the [`SymbolFileStore`]. Parsing runs on the blocking
//! pool so large maps do not stall request handling. Entries expire after a
//! period without access; the store stays authoritative for re-uploads.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use pulse_crash_core::UploadMetadata;
use pulse_crash_symbolicate::{ParsedSourceMap, ProguardMapping};
use pulse_server_config::SymbolicationConfig;

use crate::cache::{Expiry, TtlCache};
use crate::error::ResolveError;
use crate::store::SymbolFileStore;

pub struct MappingArtifactCache<S: SymbolFileStore + 'static> {
	store: Arc<S>,
	source_maps: TtlCache<UploadMetadata, Arc<ParsedSourceMap>>,
	proguard_maps: TtlCache<UploadMetadata, Arc<ProguardMapping>>,
	fetch_timeout: Duration,
}

impl<S: SymbolFileStore + 'static> MappingArtifactCache<S> {
	pub fn new(store: Arc<S>, ttl: Duration, max_entries: usize, fetch_timeout: Duration) -> Self {
		Self {
			store,
			source_maps: TtlCache::new(ttl, max_entries, Expiry::AfterAccess),
			proguard_maps: TtlCache::new(ttl, max_entries, Expiry::AfterAccess),
			fetch_timeout,
		}
	}

	pub fn from_config(store: Arc<S>, config: &SymbolicationConfig) -> Self {
		Self::new(
			store,
			config.artifact_ttl(),
			config.artifact_max_entries,
			config.fetch_timeout(),
		)
	}

	pub fn store(&self) -> &Arc<S> {
		&self.store
	}

	pub async fn get_source_map(
		&self,
		metadata: &UploadMetadata,
	) -> Result<Arc<ParsedSourceMap>, ResolveError> {
		self.get_or_fetch(&self.source_maps, metadata, ParsedSourceMap::from_bytes)
			.await
	}

	pub async fn get_proguard_map(
		&self,
		metadata: &UploadMetadata,
	) -> Result<Arc<ProguardMapping>, ResolveError> {
		self.get_or_fetch(&self.proguard_maps, metadata, ProguardMapping::parse)
			.await
	}

	#[instrument(skip(self, cache, parse), fields(key = %metadata))]
	async fn get_or_fetch<T>(
		&self,
		cache: &TtlCache<UploadMetadata, Arc<T>>,
		metadata: &UploadMetadata,
		parse: fn(&[u8]) -> pulse_crash_symbolicate::Result<T>,
	) -> Result<Arc<T>, ResolveError>
	where
		T: Send + Sync + 'static,
	{
		if let Some(artifact) = cache.get(metadata) {
			debug!("Mapping artifact cache hit");
			return Ok(artifact);
		}

		let fetch_failed = |message: String| ResolveError::ArtifactFetchFailed {
			metadata: metadata.clone(),
			message,
		};

		let read = tokio::time::timeout(self.fetch_timeout, self.store.read_file(metadata));
		let bytes = match read.await {
			Err(_) => {
				return Err(fetch_failed(format!(
					"timed out after {}ms",
					self.fetch_timeout.as_millis()
				)))
			}
			Ok(Err(e)) => return Err(fetch_failed(e.to_string())),
			Ok(Ok(None)) => {
				return Err(ResolveError::ArtifactNotFound {
					metadata: metadata.clone(),
				})
			}
			Ok(Ok(Some(bytes))) => bytes,
		};

		let size_bytes = bytes.len();
		let parsed = tokio::task::spawn_blocking(move || parse(&bytes))
			.await
			.map_err(|e| fetch_failed(e.to_string()))?
			.map_err(|e| fetch_failed(e.to_string()))?;

		debug!(size_bytes, "Loaded mapping artifact");
		let artifact = Arc::new(parsed);
		cache.insert(metadata.clone(), artifact.clone());
		Ok(artifact)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::InMemorySymbolFileStore;
	use pulse_crash_core::{ArtifactKind, EventMeta};

	const SOURCE_MAP: &str = r#"{"version":3,"sources":["src/a.ts"],"names":["f"],"mappings":"AAAAA"}"#;

	fn cache(store: Arc<InMemorySymbolFileStore>) -> MappingArtifactCache<InMemorySymbolFileStore> {
		MappingArtifactCache::new(
			store,
			Duration::from_secs(60),
			10,
			Duration::from_secs(1),
		)
	}

	fn key(kind: ArtifactKind) -> UploadMetadata {
		EventMeta::new("android", "1.0", "1").upload_metadata(kind)
	}

	#[tokio::test]
	async fn missing_artifact_is_not_found() {
		let cache = cache(Arc::new(InMemorySymbolFileStore::new()));
		let err = cache
			.get_source_map(&key(ArtifactKind::SourceMap))
			.await
			.unwrap_err();
		assert_eq!(err.kind(), "artifact_not_found");
	}

	struct StalledStore;

	#[async_trait::async_trait]
	impl SymbolFileStore for StalledStore {
		async fn read_file(&self, _metadata: &UploadMetadata) -> crate::Result<Option<Vec<u8>>> {
			std::future::pending().await
		}

		async fn upload_file(
			&self,
			_metadata: &UploadMetadata,
			_data: &[u8],
		) -> crate::Result<()> {
			Ok(())
		}
	}

	#[tokio::test(start_paused = true)]
	async fn stalled_read_times_out_as_fetch_failure() {
		let cache = MappingArtifactCache::new(
			Arc::new(StalledStore),
			Duration::from_secs(60),
			10,
			Duration::from_secs(1),
		);
		let started = tokio::time::Instant::now();
		let err = cache
			.get_proguard_map(&key(ArtifactKind::ProguardMap))
			.await
			.unwrap_err();
		assert_eq!(err.kind(), "artifact_fetch_failed");
		assert!(err.to_string().contains("timed out after 1000ms"));
		assert!(started.elapsed() >= Duration::from_secs(1));
	}

	#[tokio::test]
	async fn parse_error_is_fetch_failure() {
		let store = Arc::new(InMemorySymbolFileStore::new());
		store
			.upload_file(&key(ArtifactKind::SourceMap), b"not json")
			.await
			.unwrap();
		let err = cache(store)
			.get_source_map(&key(ArtifactKind::SourceMap))
			.await
			.unwrap_err();
		assert_eq!(err.kind(), "artifact_fetch_failed");
	}

	#[tokio::test]
	async fn parsed_artifact_is_shared() {
		let store = Arc::new(InMemorySymbolFileStore::new());
		store
			.upload_file(&key(ArtifactKind::SourceMap), SOURCE_MAP.as_bytes())
			.await
			.unwrap();
		let cache = cache(store);

		let first = cache.get_source_map(&key(ArtifactKind::SourceMap)).await.unwrap();
		let second = cache.get_source_map(&key(ArtifactKind::SourceMap)).await.unwrap();
		assert!(Arc::ptr_eq(&first, &second));
	}

	#[tokio::test]
	async fn proguard_map_loads() {
		let store = Arc::new(InMemorySymbolFileStore::new());
		store
			.upload_file(
				&key(ArtifactKind::ProguardMap),
				b"com.example.Main -> a:\n    void run() -> a\n",
			)
			.await
			.unwrap();
		let mapping = cache(store)
			.get_proguard_map(&key(ArtifactKind::ProguardMap))
			.await
			.unwrap();
		assert_eq!(mapping.original_class_name("a"), Some("com.example.Main"));
	}
}
