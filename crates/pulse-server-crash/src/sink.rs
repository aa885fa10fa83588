// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Destination for grouped error rows.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;
use crate::event::StackTraceEvent;

/// Columnar analytics storage for grouped errors.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
	/// Insert rows, returning how many were written.
	async fn insert_stack_traces(&self, events: &[StackTraceEvent]) -> Result<u64>;
}

/// Sink that keeps rows in memory.
#[derive(Debug, Default)]
pub struct InMemorySink {
	events: RwLock<Vec<StackTraceEvent>>,
}

impl InMemorySink {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn events(&self) -> Vec<StackTraceEvent> {
		self.events.read().clone()
	}
}

#[async_trait]
impl AnalyticsSink for InMemorySink {
	async fn insert_stack_traces(&self, events: &[StackTraceEvent]) -> Result<u64> {
		self.events.write().extend_from_slice(events);
		Ok(events.len() as u64)
	}
}
