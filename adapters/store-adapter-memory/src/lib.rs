//! In-memory expiring store adapter
//!
//! Implements the [`ExpiringStore`] trait on top of a sharded concurrent map.
//!
//! # Retention
//!
//! Every entry carries a sliding time-to-live fixed when the entry is created.
//! Each `get_or_create` or `try_get` hit moves its last-access time forward.
//! Both are kept in nanoseconds, the resolution of the clock. An entry
//! untouched for its TTL or longer is dead:
//!
//! - lookups treat it as absent and drop it on the spot
//! - `get_or_create` replaces it with a freshly initialised value
//! - [`MemoryStore::purge_expired`] (and the optional background task started
//!   by [`MemoryStore::spawn_eviction_task`]) sweeps the rest
//!
//! There is no capacity bound; memory is reclaimed by expiry only.
//!
//! # Concurrency
//!
//! Creation goes through the map's entry API, which holds the shard lock for
//! the key, so two threads racing on a never-seen key receive the same value.
//! Values are handed out as `Arc<V>`; no map lock is held once a call returns.

use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use banhammer_types::clock::{Clock, SystemClock};
use banhammer_types::store_adapter::ExpiringStore;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;
use tracing::debug;

/// Cached value with its retention state
#[derive(Debug)]
struct StoreEntry<V> {
	value: Arc<V>,

	/// Sliding retention in nanoseconds
	ttl_ns: i64,

	/// Last access, unix nanoseconds
	last_accessed: AtomicI64,
}

/// Unix nanoseconds, saturating outside the representable years 1677..2262
fn unix_nanos(time: DateTime<Utc>) -> i64 {
	time.timestamp_nanos_opt()
		.unwrap_or(if time.timestamp() < 0 { i64::MIN } else { i64::MAX })
}

impl<V> StoreEntry<V> {
	fn new(value: V, ttl: Duration, now: i64) -> Self {
		Self {
			value: Arc::new(value),
			ttl_ns: i64::try_from(ttl.as_nanos()).unwrap_or(i64::MAX),
			last_accessed: AtomicI64::new(now),
		}
	}

	fn touch(&self, now: i64) {
		self.last_accessed.fetch_max(now, Ordering::Relaxed);
	}

	fn is_expired(&self, now: i64) -> bool {
		now.saturating_sub(self.last_accessed.load(Ordering::Relaxed)) >= self.ttl_ns
	}
}

/// Concurrent in-memory store with sliding expiration
pub struct MemoryStore<K, V> {
	entries: Arc<DashMap<K, StoreEntry<V>>>,
	clock: Arc<dyn Clock>,
}

impl<K: Eq + Hash, V> MemoryStore<K, V> {
	pub fn new() -> Self {
		Self::with_clock(Arc::new(SystemClock))
	}

	/// Create a store that measures retention with the given clock
	pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
		Self { entries: Arc::new(DashMap::new()), clock }
	}

	/// Number of stored entries, including expired ones not yet purged
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Drop every expired entry, returning how many were removed
	pub fn purge_expired(&self) -> usize {
		purge(&self.entries, unix_nanos(self.clock.now()))
	}

	/// Spawn a background task sweeping expired entries every `interval`.
	///
	/// Must be called from within a tokio runtime. The task keeps running
	/// until the returned handle is aborted or the runtime shuts down.
	pub fn spawn_eviction_task(&self, interval: Duration) -> JoinHandle<()>
	where
		K: Send + Sync + 'static,
		V: Send + Sync + 'static,
	{
		let entries = Arc::clone(&self.entries);
		let clock = Arc::clone(&self.clock);
		let period = interval.max(Duration::from_millis(1));

		tokio::spawn(async move {
			let mut interval = tokio::time::interval(period);

			loop {
				interval.tick().await;

				let purged = purge(&entries, unix_nanos(clock.now()));
				if purged > 0 {
					debug!("Auto-evicted {} expired entries", purged);
				}
			}
		})
	}
}

impl<K: Eq + Hash, V> Default for MemoryStore<K, V> {
	fn default() -> Self {
		Self::new()
	}
}

fn purge<K: Eq + Hash, V>(entries: &DashMap<K, StoreEntry<V>>, now: i64) -> usize {
	let mut purged = 0;
	entries.retain(|_, entry| {
		let keep = !entry.is_expired(now);
		if !keep {
			purged += 1;
		}
		keep
	});
	purged
}

impl<K, V> ExpiringStore<K, V> for MemoryStore<K, V>
where
	K: Eq + Hash + Send + Sync,
	V: Send + Sync,
{
	fn clock(&self) -> Arc<dyn Clock> {
		Arc::clone(&self.clock)
	}

	fn get_or_create(
		&self,
		key: K,
		now: DateTime<Utc>,
		ttl: Duration,
		init: &dyn Fn() -> V,
	) -> Arc<V> {
		let now = unix_nanos(now);

		match self.entries.entry(key) {
			Entry::Occupied(mut occupied) => {
				if occupied.get().is_expired(now) {
					let entry = StoreEntry::new(init(), ttl, now);
					let value = Arc::clone(&entry.value);
					occupied.insert(entry);
					value
				} else {
					let entry = occupied.get();
					entry.touch(now);
					Arc::clone(&entry.value)
				}
			}
			Entry::Vacant(vacant) => {
				let entry = StoreEntry::new(init(), ttl, now);
				let value = Arc::clone(&entry.value);
				vacant.insert(entry);
				value
			}
		}
	}

	fn try_get(&self, key: &K, now: DateTime<Utc>) -> Option<Arc<V>> {
		let now = unix_nanos(now);

		{
			let entry = self.entries.get(key)?;
			if !entry.is_expired(now) {
				entry.touch(now);
				return Some(Arc::clone(&entry.value));
			}
		}

		// Shard read guard is released above; re-check under the write lock
		self.entries.remove_if(key, |_, entry| entry.is_expired(now));
		None
	}

	fn remove(&self, key: &K) {
		self.entries.remove(key);
	}
}


// vim: ts=4
