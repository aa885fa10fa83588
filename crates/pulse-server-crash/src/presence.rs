// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Presence cache: whether a build has a usable mapping for a lane.
//!
//! A negative entry acts as a circuit breaker. While it is live the
//! symbolicator skips the store entirely for that `platform:version:lane`.
//! Both outcomes expire back to [`Presence::Unknown`] after the TTL.

use std::time::Duration;
use tracing::debug;

use crate::cache::{Expiry, TtlCache};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
	Unknown,
	Present,
	Absent,
}

#[derive(Debug)]
pub struct PresenceCache {
	entries: TtlCache<String, bool>,
}

impl PresenceCache {
	pub fn new(ttl: Duration, max_entries: usize) -> Self {
		Self {
			entries: TtlCache::new(ttl, max_entries, Expiry::AfterWrite),
		}
	}

	pub fn get(&self, key: &str) -> Presence {
		match self.entries.get(&key.to_string()) {
			Some(true) => Presence::Present,
			Some(false) => Presence::Absent,
			None => Presence::Unknown,
		}
	}

	pub fn mark_present(&self, key: &str) {
		self.entries.insert(key.to_string(), true);
	}

	pub fn mark_absent(&self, key: &str) {
		debug!(
			cache_key = %key,
			ttl_secs = self.entries.ttl().as_secs(),
			"Recording missing mapping"
		);
		self.entries.insert(key.to_string(), false);
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl Default for PresenceCache {
	fn default() -> Self {
		Self::new(Duration::from_secs(300), 500)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test(start_paused = true)]
	async fn unseen_key_is_unknown() {
		let cache = PresenceCache::default();
		assert_eq!(cache.get("android:1.0:JS"), Presence::Unknown);
	}

	#[tokio::test(start_paused = true)]
	async fn outcomes_expire_back_to_unknown() {
		let cache = PresenceCache::new(Duration::from_secs(300), 500);
		cache.mark_absent("android:1.0:JS");
		cache.mark_present("android:1.0:JAVA");
		assert_eq!(cache.get("android:1.0:JS"), Presence::Absent);
		assert_eq!(cache.get("android:1.0:JAVA"), Presence::Present);

		tokio::time::advance(Duration::from_secs(301)).await;
		assert_eq!(cache.get("android:1.0:JS"), Presence::Unknown);
		assert_eq!(cache.get("android:1.0:JAVA"), Presence::Unknown);
	}

	#[tokio::test(start_paused = true)]
	async fn later_outcome_overwrites() {
		let cache = PresenceCache::default();
		cache.mark_absent("ios:2.0:JS");
		cache.mark_present("ios:2.0:JS");
		assert_eq!(cache.get("ios:2.0:JS"), Presence::Present);
		assert_eq!(cache.len(), 1);
	}
}
