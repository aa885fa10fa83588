// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Grouping orchestration.
//!
//! For each event: parse the raw trace, symbolicate every lane, pick the
//! primary lane and hash its exception types and top in-app tokens into a
//! [`Group`]. The full trace is rebuilt from the symbolicated lanes for
//! display.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use pulse_crash_core::{
	choose_primary, parse_stacktrace, select_signature_tokens, types_for_primary,
	CompleteSymbolication, EventMeta, Group, InAppRules, ParsedFrames, DEFAULT_TOP_N_FRAMES,
};
use pulse_server_config::GroupingConfig;

use crate::error::Result;
use crate::event::{
	attr, format_timestamp, span_id_hex, trace_id_hex, IngestRecord, StackTraceEvent,
};
use crate::sink::AnalyticsSink;
use crate::store::SymbolFileStore;
use crate::symbolicate::Symbolicator;

/// Group plus everything needed to rebuild the symbolicated trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingResult {
	pub group: Group,
	pub parsed: ParsedFrames,
	pub complete: CompleteSymbolication,
}

impl ProcessingResult {
	pub fn symbolicated_trace(&self) -> String {
		self.complete.reconstruct(&self.parsed)
	}
}

pub struct ErrorGroupingService<S: SymbolFileStore + 'static> {
	symbolicator: Arc<Symbolicator<S>>,
	rules: InAppRules,
	top_n_frames: usize,
}

impl<S: SymbolFileStore + 'static> ErrorGroupingService<S> {
	pub fn new(symbolicator: Arc<Symbolicator<S>>, rules: InAppRules, top_n_frames: usize) -> Self {
		Self {
			symbolicator,
			rules,
			top_n_frames: top_n_frames.max(1),
		}
	}

	pub fn from_config(symbolicator: Arc<Symbolicator<S>>, config: &GroupingConfig) -> Self {
		Self::new(symbolicator, config.in_app_rules(), config.top_n_frames)
	}

	/// Service with default in-app rules and frame count.
	pub fn with_defaults(symbolicator: Arc<Symbolicator<S>>) -> Self {
		Self::new(symbolicator, InAppRules::default(), DEFAULT_TOP_N_FRAMES)
	}

	pub fn symbolicator(&self) -> &Symbolicator<S> {
		&self.symbolicator
	}

	/// Group one raw trace. An absent trace groups as an empty one.
	#[instrument(
		skip(self, raw, meta),
		fields(platform = %meta.platform, app_version = %meta.app_version)
	)]
	pub async fn process(&self, raw: Option<&str>, meta: &EventMeta) -> ProcessingResult {
		let parsed = parse_stacktrace(raw, &self.rules);
		let complete = self.symbolicator.resolve_complete(&parsed, meta).await;

		let lane = choose_primary(&parsed);
		let types = types_for_primary(&parsed, lane);
		let tokens = select_signature_tokens(&self.rules, complete.lane(lane), self.top_n_frames);
		let group = Group::from_tokens(lane, &types, &tokens);

		debug!(
			group_id = %group.group_id,
			lane = %lane,
			frames = parsed.frame_count(),
			"Grouped event"
		);
		ProcessingResult {
			group,
			parsed,
			complete,
		}
	}

	/// Build the analytics row for one record.
	pub async fn process_record(&self, record: &IngestRecord) -> Result<StackTraceEvent> {
		let meta = record.event_meta();
		let stack_trace = record.stack_trace();
		let result = self.process(stack_trace, &meta).await;

		let log = |key: &str| record.log_attr(key).map(str::to_string);
		let resource = |key: &str| record.resource_attr(key).map(str::to_string);

		Ok(StackTraceEvent {
			timestamp: format_timestamp(record.observed_time_unix_nano)?,
			pulse_type: log(attr::PULSE_TYPE),
			title: result.group.display_name.clone(),
			exception_stack_trace: result.symbolicated_trace(),
			exception_stack_trace_raw: stack_trace.map(str::to_string),
			exception_message: log(attr::EXCEPTION_MESSAGE),
			exception_type: record.error_type().map(str::to_string),
			interactions: record.interactions()?,
			screen_name: log(attr::SCREEN_NAME),
			user_id: log(attr::USER_ID),
			session_id: log(attr::SESSION_ID),
			platform: resource(attr::PLATFORM),
			os_version: resource(attr::OS_VERSION),
			device_model: resource(attr::DEVICE_MODEL),
			app_version_code: resource(attr::APP_VERSION_CODE),
			app_version: resource(attr::APP_VERSION),
			sdk_version: resource(attr::SDK_VERSION),
			trace_id: trace_id_hex(&record.trace_id),
			span_id: span_id_hex(&record.span_id),
			group_id: result.group.group_id,
			signature: result.group.signature,
			fingerprint: result.group.fingerprint,
			scope_attributes: record.scope_attributes.clone(),
			log_attributes: record.log_attributes.clone(),
			resource_attributes: record.resource_attributes.clone(),
		})
	}

	/// Process records concurrently. Records that cannot be turned into a row
	/// are logged and skipped.
	#[instrument(skip_all, fields(records = records.len()))]
	pub async fn process_batch(&self, records: &[IngestRecord]) -> Vec<StackTraceEvent> {
		let results = join_all(records.iter().map(|record| self.process_record(record))).await;

		results
			.into_iter()
			.filter_map(|result| match result {
				Ok(event) => Some(event),
				Err(e) => {
					warn!(error = %e, "Skipping record that failed processing");
					None
				}
			})
			.collect()
	}

	/// Process a batch and write the rows to `sink`.
	#[instrument(skip_all, fields(records = records.len()))]
	pub async fn ingest(&self, records: &[IngestRecord], sink: &dyn AnalyticsSink) -> Result<u64> {
		let events = self.process_batch(records).await;
		let inserted = sink.insert_stack_traces(&events).await?;
		info!(inserted, skipped = records.len() - events.len(), "Ingested error batch");
		Ok(inserted)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sink::InMemorySink;
	use crate::store::InMemorySymbolFileStore;
	use pulse_crash_core::{ArtifactKind, Lane};
	use pulse_server_config::SymbolicationConfig;
	use std::collections::BTreeMap;

	const SOURCE_MAP: &str = r#"{
		"version": 3,
		"sources": ["src/screens/Home.tsx"],
		"names": ["renderScreen"],
		"mappings": ";;;;;;;;;IAAAA"
	}"#;

	fn meta() -> EventMeta {
		EventMeta::new("ios", "2.0.0", "200")
	}

	fn service(
		store: Arc<InMemorySymbolFileStore>,
	) -> ErrorGroupingService<InMemorySymbolFileStore> {
		let symbolicator = Symbolicator::from_config(store, &SymbolicationConfig::default());
		ErrorGroupingService::with_defaults(Arc::new(symbolicator))
	}

	#[tokio::test]
	async fn js_trace_groups_on_resolved_tokens() {
		let store = Arc::new(InMemorySymbolFileStore::new());
		store
			.upload_file(
				&meta().upload_metadata(ArtifactKind::SourceMap),
				SOURCE_MAP.as_bytes(),
			)
			.await
			.unwrap();
		let service = service(store);

		let result = service
			.process(
				Some("TypeError: undefined is not a function\n    at foo (app/bundle.js:10:5)"),
				&meta(),
			)
			.await;

		assert_eq!(result.group.platform, "js");
		assert_eq!(
			result.group.signature,
			"v1|platform:js|exc:TypeError|frames:src/screens/Home.tsx#renderScreen"
		);
		assert!(result.group.group_id.starts_with("EXC-"));
		assert_eq!(
			result.symbolicated_trace(),
			"TypeError: undefined is not a function\n  at renderScreen (src/screens/Home.tsx:1:1)\n"
		);
	}

	#[tokio::test]
	async fn third_party_frames_do_not_split_groups() {
		let service = service(Arc::new(InMemorySymbolFileStore::new()));

		let a = service
			.process(
				Some(
					"TypeError: x is undefined\n\
					at render (src/App.js:10:2)\n\
					at dispatch (node_modules/react/index.js:5:1)",
				),
				&meta(),
			)
			.await;
		let b = service
			.process(
				Some(
					"TypeError: x is undefined\n\
					at render (src/App.js:10:2)\n\
					at commitRoot (node_modules/react-dom/cjs/react-dom.js:99:3)\n\
					at flush (node_modules/scheduler/index.js:1:1)",
				),
				&meta(),
			)
			.await;

		assert_eq!(a.group.group_id, b.group.group_id);
		assert_eq!(a.group.signature, "v1|platform:js|exc:TypeError|frames:src/App.js#render");
		assert_ne!(a.symbolicated_trace(), b.symbolicated_trace());
	}

	#[tokio::test]
	async fn message_text_does_not_affect_group() {
		let service = service(Arc::new(InMemorySymbolFileStore::new()));
		let trace = |message: &str| {
			format!("java.lang.IllegalStateException: {message}\n\tat com.example.Main.run(Main.java:4)")
		};

		let a = service.process(Some(&trace("id 1")), &meta()).await;
		let b = service.process(Some(&trace("id 2")), &meta()).await;
		assert_eq!(a.group, b.group);
		assert_eq!(a.group.platform, Lane::Java.platform_tag());
	}

	#[tokio::test]
	async fn absent_trace_still_groups() {
		let service = service(Arc::new(InMemorySymbolFileStore::new()));
		let result = service.process(None, &meta()).await;
		assert_eq!(result.group.signature, "v1|platform:unknown|exc:|frames:");
		assert_eq!(result.symbolicated_trace(), "");
	}

	fn record(stack_trace: &str) -> IngestRecord {
		let resource_attributes = BTreeMap::from([
			(attr::PLATFORM.to_string(), "android".to_string()),
			(attr::APP_VERSION.to_string(), "1.0".to_string()),
			(attr::APP_VERSION_CODE.to_string(), "10".to_string()),
			(attr::DEVICE_MODEL.to_string(), "Pixel 8".to_string()),
			(attr::INTERACTIONS.to_string(), r#"["checkout"]"#.to_string()),
		]);
		let log_attributes = BTreeMap::from([
			(attr::STACKTRACE.to_string(), stack_trace.to_string()),
			(attr::EXCEPTION_TYPE.to_string(), "java.lang.IllegalStateException".to_string()),
			(attr::SCREEN_NAME.to_string(), "Checkout".to_string()),
		]);
		IngestRecord {
			observed_time_unix_nano: 1_700_000_000_000_000_001,
			trace_id: vec![1; 16],
			span_id: vec![2; 3],
			resource_attributes,
			log_attributes,
			..Default::default()
		}
	}

	#[tokio::test]
	async fn record_becomes_analytics_row() {
		let service = service(Arc::new(InMemorySymbolFileStore::new()));
		let event = service
			.process_record(&record(
				"java.lang.IllegalStateException: boom\n\tat com.example.Main.run(Main.java:4)",
			))
			.await
			.unwrap();

		assert_eq!(event.timestamp, "2023-11-14 22:13:20.000000001");
		assert_eq!(event.platform.as_deref(), Some("android"));
		assert_eq!(event.device_model.as_deref(), Some("Pixel 8"));
		assert_eq!(event.screen_name.as_deref(), Some("Checkout"));
		assert_eq!(
			event.exception_type.as_deref(),
			Some("java.lang.IllegalStateException")
		);
		assert_eq!(event.interactions, vec!["checkout"]);
		assert_eq!(event.trace_id.as_deref(), Some("01010101010101010101010101010101"));
		assert_eq!(event.span_id, None);
		assert!(event.title.starts_with("java.lang.IllegalStateException at example.Main#run"));
		assert!(event.exception_stack_trace_raw.is_some());
	}

	#[tokio::test]
	async fn ingest_skips_failing_records() {
		let service = service(Arc::new(InMemorySymbolFileStore::new()));
		let mut broken = record("TypeError: x\n    at f (src/a.js:1:1)");
		broken
			.resource_attributes
			.insert(attr::INTERACTIONS.to_string(), "not json".to_string());
		let records = vec![record("TypeError: x\n    at f (src/a.js:1:1)"), broken];

		let sink = InMemorySink::new();
		let inserted = service.ingest(&records, &sink).await.unwrap();
		assert_eq!(inserted, 1);
		assert_eq!(sink.events().len(), 1);
	}
}
