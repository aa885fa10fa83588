// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bounded in-memory cache with per-entry TTL.
//!
//! Time is read from `tokio::time::Instant` so tests can drive expiry with a
//! paused clock.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

/// When an entry's TTL starts counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
	/// From the last insert.
	AfterWrite,
	/// From the last insert or successful lookup.
	AfterAccess,
}

#[derive(Debug, Clone)]
struct Entry<V> {
	value: V,
	expires_at: Instant,
	last_used: Instant,
}

/// Thread-safe cache bounded by entry count, evicting the least recently used
/// entry when full.
#[derive(Debug)]
pub struct TtlCache<K, V> {
	entries: Mutex<HashMap<K, Entry<V>>>,
	ttl: Duration,
	max_entries: usize,
	expiry: Expiry,
}

impl<K, V> TtlCache<K, V>
where
	K: Eq + Hash + Clone,
	V: Clone,
{
	pub fn new(ttl: Duration, max_entries: usize, expiry: Expiry) -> Self {
		Self {
			entries: Mutex::new(HashMap::new()),
			ttl,
			max_entries: max_entries.max(1),
			expiry,
		}
	}

	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Look up a live entry. Expired entries are dropped on the way.
	pub fn get(&self, key: &K) -> Option<V> {
		let now = Instant::now();
		let mut entries = self.entries.lock();

		if let Some(entry) = entries.get_mut(key) {
			if entry.expires_at > now {
				entry.last_used = now;
				if self.expiry == Expiry::AfterAccess {
					entry.expires_at = now + self.ttl;
				}
				return Some(entry.value.clone());
			}
			entries.remove(key);
		}

		None
	}

	/// Insert or replace an entry.
	pub fn insert(&self, key: K, value: V) {
		let now = Instant::now();
		let mut entries = self.entries.lock();

		if !entries.contains_key(&key) && entries.len() >= self.max_entries {
			entries.retain(|_, entry| entry.expires_at > now);
			if entries.len() >= self.max_entries {
				evict_lru(&mut entries);
			}
		}

		entries.insert(
			key,
			Entry {
				value,
				expires_at: now + self.ttl,
				last_used: now,
			},
		);
	}

	/// Number of stored entries, including any not yet swept after expiry.
	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}
}

fn evict_lru<K: Eq + Hash + Clone, V>(entries: &mut HashMap<K, Entry<V>>) {
	if let Some(oldest) = entries
		.iter()
		.min_by_key(|(_, entry)| entry.last_used)
		.map(|(k, _)| k.clone())
	{
		entries.remove(&oldest);
	}
}
