// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ingested log records and the analytics rows produced from them.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use pulse_crash_core::EventMeta;

use crate::error::{CrashServerError, Result};

/// Attribute keys read from ingested records.
pub mod attr {
	pub const APP_VERSION: &str = "app.build_name";
	pub const APP_VERSION_CODE: &str = "app.build_id";
	pub const PLATFORM: &str = "os.name";
	pub const OS_VERSION: &str = "os.version";
	pub const SDK_VERSION: &str = "rum.sdk.version";
	pub const DEVICE_MODEL: &str = "device.model.name";
	pub const INTERACTIONS: &str = "pulse.interaction.active.names";

	pub const STACKTRACE: &str = "exception.stacktrace";
	pub const EXCEPTION_MESSAGE: &str = "exception.message";
	pub const EXCEPTION_TYPE: &str = "exception.type";
	pub const PULSE_TYPE: &str = "pulse.type";
	pub const SCREEN_NAME: &str = "screen.name";
	pub const USER_ID: &str = "user.id";
	pub const SESSION_ID: &str = "session.id";
}

pub const TRACE_ID_LEN: usize = 16;
pub const SPAN_ID_LEN: usize = 8;

/// One decoded error log record with the attributes of its resource and scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IngestRecord {
	pub observed_time_unix_nano: u64,
	pub trace_id: Vec<u8>,
	pub span_id: Vec<u8>,
	pub resource_attributes: BTreeMap<String, String>,
	pub scope_attributes: BTreeMap<String, String>,
	pub log_attributes: BTreeMap<String, String>,
}

impl IngestRecord {
	pub fn resource_attr(&self, key: &str) -> Option<&str> {
		self.resource_attributes.get(key).map(String::as_str)
	}

	pub fn log_attr(&self, key: &str) -> Option<&str> {
		self.log_attributes.get(key).map(String::as_str)
	}

	/// Build identity taken from resource attributes; missing values are empty.
	pub fn event_meta(&self) -> EventMeta {
		EventMeta::new(
			self.resource_attr(attr::PLATFORM).unwrap_or_default(),
			self.resource_attr(attr::APP_VERSION).unwrap_or_default(),
			self.resource_attr(attr::APP_VERSION_CODE).unwrap_or_default(),
		)
	}

	pub fn stack_trace(&self) -> Option<&str> {
		self.log_attr(attr::STACKTRACE)
	}

	pub fn error_type(&self) -> Option<&str> {
		self.log_attr(attr::EXCEPTION_TYPE)
	}

	/// Names of the interactions active when the error happened, stored as a
	/// JSON array in a resource attribute.
	pub fn interactions(&self) -> Result<Vec<String>> {
		match self.resource_attr(attr::INTERACTIONS) {
			Some(raw) => Ok(serde_json::from_str(raw)?),
			None => Ok(Vec::new()),
		}
	}
}

/// Analytics row for one grouped error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackTraceEvent {
	pub timestamp: String,
	pub pulse_type: Option<String>,
	pub title: String,
	/// Symbolicated trace.
	pub exception_stack_trace: String,
	pub exception_stack_trace_raw: Option<String>,
	pub exception_message: Option<String>,
	pub exception_type: Option<String>,
	pub interactions: Vec<String>,
	pub screen_name: Option<String>,
	pub user_id: Option<String>,
	pub session_id: Option<String>,
	pub platform: Option<String>,
	pub os_version: Option<String>,
	pub device_model: Option<String>,
	pub app_version_code: Option<String>,
	pub app_version: Option<String>,
	pub sdk_version: Option<String>,
	pub trace_id: Option<String>,
	pub span_id: Option<String>,
	pub group_id: String,
	pub signature: String,
	pub fingerprint: String,
	pub scope_attributes: BTreeMap<String, String>,
	pub log_attributes: BTreeMap<String, String>,
	pub resource_attributes: BTreeMap<String, String>,
}

/// Format epoch nanoseconds as `YYYY-MM-DD HH:MM:SS.nnnnnnnnn` in UTC.
pub fn format_timestamp(epoch_nanos: u64) -> Result<String> {
	let secs = (epoch_nanos / 1_000_000_000) as i64;
	let nanos = (epoch_nanos % 1_000_000_000) as u32;
	DateTime::from_timestamp(secs, nanos)
		.map(|dt| dt.format("%Y-%m-%d %H:%M:%S%.9f").to_string())
		.ok_or_else(|| CrashServerError::InvalidDateTime(epoch_nanos.to_string()))
}

fn id_hex(bytes: &[u8], len: usize) -> Option<String> {
	(bytes.len() == len).then(|| hex::encode(bytes))
}

/// Lower-case hex trace id, or `None` unless exactly 16 bytes.
pub fn trace_id_hex(bytes: &[u8]) -> Option<String> {
	id_hex(bytes, TRACE_ID_LEN)
}

/// Lower-case hex span id, or `None` unless exactly 8 bytes.
pub fn span_id_hex(bytes: &[u8]) -> Option<String> {
	id_hex(bytes, SPAN_ID_LEN)
}
