//! Common test utilities and helpers
//!
//! Builders for stores, options monitors and accounters shared by the
//! integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use banhammer::clock::ManualClock;
use banhammer::key::ScopedKey;
use banhammer::prelude::*;

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

pub fn options(limit: u32, ban_time: Duration) -> BanAccounterOptions {
	BanAccounterOptions { bad_count_limit: limit, ban_time, ..Default::default() }
}

pub fn monitor<T: Validate>(opts: T) -> Arc<OptionsMonitor<T>> {
	Arc::new(OptionsMonitor::new(opts).unwrap())
}

/// Store on the wall clock
pub fn store<K: BanKey>() -> Arc<MemoryStore<ScopedKey<K>, RecordCell>> {
	Arc::new(MemoryStore::new())
}

/// Store driven by a manual clock
pub fn manual_store<K: BanKey>(
	clock: &Arc<ManualClock>,
) -> Arc<MemoryStore<ScopedKey<K>, RecordCell>> {
	Arc::new(MemoryStore::with_clock(clock.clone()))
}

/// Accounter and clock sharing one manual time source
pub fn manual_accounter<K: BanKey>(
	namespace: &str,
	opts: BanAccounterOptions,
) -> (BanAccounter<K>, Arc<ManualClock>) {
	let clock = Arc::new(ManualClock::starting_now());
	let store = manual_store::<K>(&clock);
	let accounter = BanAccounter::new(namespace, store, monitor(opts));
	(accounter, clock)
}

// vim: ts=4
