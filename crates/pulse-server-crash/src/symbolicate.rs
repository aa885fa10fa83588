// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Best-effort symbolication of one event's frames.
//!
//! Resolution is all-or-nothing per batch: if any frame fails, every frame
//! keeps its unresolved token. Failures never reach the caller. They are
//! logged and recorded in the [`PresenceCache`] so later events for the same
//! build and lane skip the store until the entry expires.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use pulse_crash_core::frame::java_token;
use pulse_crash_core::normalize::{normalize_java_class, normalize_java_method};
use pulse_crash_core::{
	ArtifactKind, CompleteSymbolication, EventMeta, Frame, Lane, ParsedFrames, ResolvedToken,
};
use pulse_crash_symbolicate::{render_java_frame, ParsedSourceMap, ProguardMapping, Retraced};
use pulse_server_config::SymbolicationConfig;

use crate::artifacts::MappingArtifactCache;
use crate::error::ResolveError;
use crate::presence::{Presence, PresenceCache};
use crate::store::SymbolFileStore;

/// Identifier used when neither the mapping nor the frame names a function.
pub const ANONYMOUS_IDENTIFIER: &str = "<anonymous>";

pub struct Symbolicator<S: SymbolFileStore + 'static> {
	artifacts: MappingArtifactCache<S>,
	presence: Arc<PresenceCache>,
	retrace_timeout: Duration,
}

impl<S: SymbolFileStore + 'static> Symbolicator<S> {
	pub fn new(
		artifacts: MappingArtifactCache<S>,
		presence: Arc<PresenceCache>,
		retrace_timeout: Duration,
	) -> Self {
		Self {
			artifacts,
			presence,
			retrace_timeout,
		}
	}

	pub fn from_config(store: Arc<S>, config: &SymbolicationConfig) -> Self {
		Self::new(
			MappingArtifactCache::from_config(store, config),
			Arc::new(PresenceCache::new(
				config.presence_ttl(),
				config.presence_max_entries,
			)),
			config.retrace_timeout(),
		)
	}

	pub fn presence(&self) -> &PresenceCache {
		&self.presence
	}

	/// Resolve a batch of frames from one lane of one event.
	///
	/// The lane is taken from the first frame. Output keeps each frame's
	/// `original_position`; a retraced JVM frame may expand into several
	/// tokens sharing that position.
	#[instrument(
		skip(self, frames, meta),
		fields(
			frame_count = frames.len(),
			platform = %meta.platform,
			app_version = %meta.app_version
		)
	)]
	pub async fn resolve(&self, frames: &[Frame], meta: &EventMeta) -> Vec<ResolvedToken> {
		let Some(lane) = frames.first().map(Frame::lane) else {
			return Vec::new();
		};
		if !matches!(lane, Lane::Js | Lane::Java) {
			return unresolved(frames);
		}

		let cache_key = meta.presence_key(lane);
		if self.presence.get(&cache_key) == Presence::Absent {
			debug!(cache_key = %cache_key, "No mapping for build, skipping symbolication");
			return unresolved(frames);
		}

		match self.resolve_lane(lane, frames, meta).await {
			Ok(tokens) => {
				self.presence.mark_present(&cache_key);
				tokens
			}
			Err(e) => {
				warn!(
					kind = e.kind(),
					cache_key = %cache_key,
					error = %e,
					"Symbolication failed, using unresolved frames"
				);
				self.presence.mark_absent(&cache_key);
				unresolved(frames)
			}
		}
	}

	/// Resolve every lane of a parsed trace concurrently.
	pub async fn resolve_complete(
		&self,
		parsed: &ParsedFrames,
		meta: &EventMeta,
	) -> CompleteSymbolication {
		if parsed.is_empty() {
			return CompleteSymbolication::default();
		}
		let (js, java, native) = tokio::join!(
			self.resolve(&parsed.js_frames, meta),
			self.resolve(&parsed.java_frames, meta),
			self.resolve(&parsed.native_frames, meta),
		);
		CompleteSymbolication { js, java, native }
	}

	async fn resolve_lane(
		&self,
		lane: Lane,
		frames: &[Frame],
		meta: &EventMeta,
	) -> Result<Vec<ResolvedToken>, ResolveError> {
		if lane == Lane::Js {
			self.resolve_js(frames, meta).await
		} else {
			self.resolve_java(frames, meta).await
		}
	}

	async fn resolve_js(
		&self,
		frames: &[Frame],
		meta: &EventMeta,
	) -> Result<Vec<ResolvedToken>, ResolveError> {
		let map = self
			.artifacts
			.get_source_map(&meta.upload_metadata(ArtifactKind::SourceMap))
			.await?;
		frames.iter().map(|frame| resolve_js_frame(&map, frame)).collect()
	}

	async fn resolve_java(
		&self,
		frames: &[Frame],
		meta: &EventMeta,
	) -> Result<Vec<ResolvedToken>, ResolveError> {
		let mapping = self
			.artifacts
			.get_proguard_map(&meta.upload_metadata(ArtifactKind::ProguardMap))
			.await?;

		let batch = frames.to_vec();
		let task = tokio::task::spawn_blocking(move || retrace_batch(&mapping, &batch));
		match tokio::time::timeout(self.retrace_timeout, task).await {
			Err(_) => Err(ResolveError::ResolutionFailed(format!(
				"retrace timed out after {}ms",
				self.retrace_timeout.as_millis()
			))),
			Ok(Err(e)) => Err(ResolveError::ResolutionFailed(e.to_string())),
			Ok(Ok(result)) => result,
		}
	}
}

fn unresolved(frames: &[Frame]) -> Vec<ResolvedToken> {
	frames.iter().map(Frame::unresolved).collect()
}

fn resolve_js_frame(map: &ParsedSourceMap, frame: &Frame) -> Result<ResolvedToken, ResolveError> {
	let Some(js) = frame.as_js() else {
		return Ok(frame.unresolved());
	};
	let (Some(line), Some(column)) = (js.line, js.column) else {
		return Ok(frame.unresolved());
	};
	let Some(position) = map
		.lookup(line, column)
		.map_err(|e| ResolveError::ResolutionFailed(e.to_string()))?
	else {
		return Ok(frame.unresolved());
	};

	let identifier = [position.name.as_deref(), Some(js.function.as_str())]
		.into_iter()
		.flatten()
		.map(str::trim)
		.find(|name| !name.is_empty())
		.unwrap_or(ANONYMOUS_IDENTIFIER);

	Ok(frame.resolved(
		format!("{}#{}", position.source, identifier),
		format!(
			"at {} ({}:{}:{})",
			identifier, position.source, position.line, position.column
		),
	))
}

fn retrace_batch(
	mapping: &ProguardMapping,
	frames: &[Frame],
) -> Result<Vec<ResolvedToken>, ResolveError> {
	let mut out = Vec::with_capacity(frames.len());
	for frame in frames {
		if frame.lane() != Lane::Java {
			out.push(frame.unresolved());
			continue;
		}
		let retraced = mapping
			.retrace_line(&frame.raw_line)
			.map_err(|e| ResolveError::ResolutionFailed(e.to_string()))?;
		match retraced {
			Retraced::Frames(expanded) if !expanded.is_empty() => {
				out.extend(expanded.iter().map(|java| {
					frame.resolved(
						java_token(
							&normalize_java_class(&java.class),
							&normalize_java_method(&java.method),
						),
						render_java_frame(java),
					)
				}));
			}
			_ => out.push(frame.unresolved()),
		}
	}
	Ok(out)
}
