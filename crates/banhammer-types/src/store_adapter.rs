//! Adapter trait for the expiring key-value store backing the ban engine.
//!
//! The store hands out shared handles (`Arc<V>`) to values it owns. Values are
//! retained with a *sliding* time-to-live: every access through
//! [`ExpiringStore::get_or_create`] or [`ExpiringStore::try_get`] pushes the
//! expiry forward. Interior mutability of the value (e.g. a mutex) is the
//! caller's business.
//!
//! Callers pass the time of the access, read from [`ExpiringStore::clock`],
//! so that retention and whatever the caller derives from the same instant
//! agree to the nanosecond.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::clock::Clock;

pub trait ExpiringStore<K, V>: Send + Sync {
	/// Clock retention is measured with
	fn clock(&self) -> Arc<dyn Clock>;

	/// Return the live value for `key`, or atomically insert `init()` with
	/// sliding retention `ttl`. Concurrent first accesses must observe the
	/// same value.
	fn get_or_create(
		&self,
		key: K,
		now: DateTime<Utc>,
		ttl: Duration,
		init: &dyn Fn() -> V,
	) -> Arc<V>;

	/// Return the live value for `key` at `now`, refreshing its retention
	fn try_get(&self, key: &K, now: DateTime<Utc>) -> Option<Arc<V>>;

	fn remove(&self, key: &K);
}

// vim: ts=4
