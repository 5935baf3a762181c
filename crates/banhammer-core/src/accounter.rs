//! Ban Accounter
//!
//! Keeps per-key bad-action counts and decides whether a key is banned.
//! Records live in an [`ExpiringStore`] under keys scoped by the accounter's
//! namespace, each behind its own mutex: operations on different keys never
//! contend, operations on the same key are serialized.
//!
//! Options are read from the [`OptionsMonitor`] once at the start of every
//! operation, so a reload takes effect on the next call. The current time is
//! read once per operation too, from the store's clock, and the same instant
//! drives both the ban window and the record's retention.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace, warn};

use banhammer_types::clock::elapsed_between;

use crate::prelude::*;

/// Store value holding one key's record
pub type RecordCell = Mutex<BanRecord>;

/// Store an accounter keeps its records in
pub type BanStore<K> = dyn ExpiringStore<ScopedKey<K>, RecordCell>;

/// Counters since the accounter was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccounterStats {
	pub bad_actions_registered: u64,
	pub bans_issued: u64,
	pub bans_extended: u64,
}

#[derive(Debug, Default)]
struct StatCounters {
	bad_actions: AtomicU64,
	bans: AtomicU64,
	extensions: AtomicU64,
}

pub struct BanAccounter<K, O = BanAccounterOptions> {
	namespace: Namespace,
	store: Arc<BanStore<K>>,
	options: Arc<OptionsMonitor<O>>,
	clock: Arc<dyn Clock>,
	stats: StatCounters,
}

impl<K, O> BanAccounter<K, O>
where
	K: BanKey,
	O: AsRef<BanAccounterOptions> + Validate,
{
	/// Create an accounter keeping its records in `store` under `namespace`.
	/// Time is read from the store's clock.
	pub fn new(
		namespace: impl Into<Namespace>,
		store: Arc<BanStore<K>>,
		options: Arc<OptionsMonitor<O>>,
	) -> Self {
		Self {
			namespace: namespace.into(),
			clock: store.clock(),
			store,
			options,
			stats: StatCounters::default(),
		}
	}

	pub fn namespace(&self) -> &Namespace {
		&self.namespace
	}

	/// Current options snapshot
	pub fn options(&self) -> Arc<O> {
		self.options.current()
	}

	pub fn current_time(&self) -> DateTime<Utc> {
		self.clock.now()
	}

	fn scoped(&self, key: &K) -> ScopedKey<K> {
		ScopedKey::new(self.namespace.clone(), key.clone())
	}

	fn record(&self, key: &K, now: DateTime<Utc>) -> Option<Arc<RecordCell>> {
		self.store.try_get(&self.scoped(key), now)
	}

	fn record_or_create(
		&self,
		key: &K,
		now: DateTime<Utc>,
		opts: &BanAccounterOptions,
	) -> Arc<RecordCell> {
		self.store.get_or_create(self.scoped(key), now, opts.retention(), &|| {
			Mutex::new(BanRecord::default())
		})
	}

	/// Whether `key` is banned right now. Refreshes the record's retention.
	pub fn is_banned(&self, key: &K) -> bool {
		let snapshot = self.options.current();
		let opts: &BanAccounterOptions = (*snapshot).as_ref();
		if opts.disabled || opts.skips_key(key) {
			return false;
		}

		let now = self.current_time();
		let Some(record) = self.record(key, now) else {
			return false;
		};
		record.lock().ban_is_active(now)
	}

	/// Time left on the ban of `key`, `None` if it is not banned
	pub fn ban_remaining(&self, key: &K) -> Option<Duration> {
		let snapshot = self.options.current();
		let opts: &BanAccounterOptions = (*snapshot).as_ref();
		if opts.disabled || opts.skips_key(key) {
			return None;
		}

		let now = self.current_time();
		let record = self.record(key, now)?;
		record.lock().ban_remaining(now)
	}

	/// Count a bad action, banning the key once the limit is reached and
	/// extending the ban of an already banned key
	pub fn register_bad_action(&self, key: &K) {
		let snapshot = self.options.current();
		let opts: &BanAccounterOptions = (*snapshot).as_ref();
		if !opts.can_register(key) {
			return;
		}

		let now = self.current_time();
		let record = self.record_or_create(key, now, opts);
		let outcome = record.lock().register_bad_action(now, opts);

		self.stats.bad_actions.fetch_add(1, Ordering::Relaxed);
		match outcome {
			BadActionOutcome::Banned { until, limit_multiplier } => {
				self.stats.bans.fetch_add(1, Ordering::Relaxed);
				warn!(
					"Banned {:?} in {} after {} bad actions until {} (multiplier now {})",
					key, self.namespace, opts.bad_count_limit, until, limit_multiplier
				);
			}
			BadActionOutcome::Extended { until } => {
				self.stats.extensions.fetch_add(1, Ordering::Relaxed);
				debug!("Ban of {:?} in {} extended until {}", key, self.namespace, until);
			}
			BadActionOutcome::Counted { bad_count } => {
				trace!("Bad action {} for {:?} in {}", bad_count, key, self.namespace);
			}
		}
	}

	/// Remember that `key` made a request. Does not count towards bans.
	pub fn register_request(&self, key: &K) {
		let snapshot = self.options.current();
		let opts: &BanAccounterOptions = (*snapshot).as_ref();
		if !opts.can_register(key) {
			return;
		}

		let now = self.current_time();
		let record = self.record_or_create(key, now, opts);
		record.lock().request_last_time = Some(now);
	}

	fn read_record<T>(&self, key: &K, f: impl FnOnce(&BanRecord) -> T) -> Option<T> {
		let snapshot = self.options.current();
		let opts: &BanAccounterOptions = (*snapshot).as_ref();
		if opts.skips_key(key) {
			return None;
		}

		let record = self.record(key, self.current_time())?;
		let record = record.lock();
		Some(f(&record))
	}

	/// Time of the last registered request
	pub fn request_last_time(&self, key: &K) -> Option<DateTime<Utc>> {
		self.read_record(key, |r| r.request_last_time).flatten()
	}

	/// Time of the last registered bad action
	pub fn bad_action_last_time(&self, key: &K) -> Option<DateTime<Utc>> {
		self.read_record(key, |r| r.bad_action_last_time).flatten()
	}

	/// Time passed since the last registered bad action
	pub fn bad_action_last_time_passed(&self, key: &K) -> Option<Duration> {
		let last = self.bad_action_last_time(key)?;
		Some(elapsed_between(last, self.current_time()))
	}

	pub fn was_bad_actions(&self, key: &K) -> bool {
		self.bad_action_last_time(key).is_some()
	}

	/// Copy of the record of `key`
	pub fn snapshot(&self, key: &K) -> Option<BanRecord> {
		self.read_record(key, BanRecord::clone)
	}

	/// Zero the bad-action count. Ban state and multiplier stay.
	pub fn reset_bad_action_count(&self, key: &K) {
		self.update_record(key, |r| r.bad_count = 0);
	}

	/// Lower the bad-action count, never below zero
	pub fn decrease_bad_action_count(&self, key: &K, count: u32) {
		self.update_record(key, |r| r.decrease_bad_count(count));
	}

	fn update_record(&self, key: &K, f: impl FnOnce(&mut BanRecord)) {
		let snapshot = self.options.current();
		let opts: &BanAccounterOptions = (*snapshot).as_ref();
		if opts.skips_key(key) {
			return;
		}

		if let Some(record) = self.record(key, self.current_time()) {
			f(&mut record.lock());
		}
	}

	/// Forget everything about `key`: ban, count and multiplier.
	/// Works even while the accounter is disabled.
	pub fn unban(&self, key: &K) {
		self.store.remove(&self.scoped(key));
		debug!("Unbanned {:?} in {}", key, self.namespace);
	}

	pub fn stats(&self) -> AccounterStats {
		AccounterStats {
			bad_actions_registered: self.stats.bad_actions.load(Ordering::Relaxed),
			bans_issued: self.stats.bans.load(Ordering::Relaxed),
			bans_extended: self.stats.extensions.load(Ordering::Relaxed),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use banhammer_store_adapter_memory::MemoryStore;
	use banhammer_types::clock::ManualClock;

	struct Fixture {
		accounter: BanAccounter<String>,
		clock: Arc<ManualClock>,
		options: Arc<OptionsMonitor<BanAccounterOptions>>,
	}

	fn fixture(opts: BanAccounterOptions) -> Fixture {
		let clock = Arc::new(ManualClock::starting_now());
		let store: Arc<BanStore<String>> =
			Arc::new(MemoryStore::<ScopedKey<String>, RecordCell>::with_clock(clock.clone()));
		let options = Arc::new(OptionsMonitor::new(opts).unwrap());
		let accounter = BanAccounter::new("test", store, options.clone());
		Fixture { accounter, clock, options }
	}

	fn opts(limit: u32, ban_time: Duration) -> BanAccounterOptions {
		BanAccounterOptions { bad_count_limit: limit, ban_time, ..Default::default() }
	}

	fn key(s: &str) -> String {
		s.to_string()
	}

	#[test]
	fn test_disabled_never_bans_or_registers() {
		let f = fixture(BanAccounterOptions { disabled: true, ..opts(3, Duration::from_secs(1)) });
		let ip = key("1.2.3.4");

		for _ in 0..10 {
			f.accounter.register_bad_action(&ip);
		}
		assert!(!f.accounter.is_banned(&ip));
		assert!(f.accounter.bad_action_last_time(&ip).is_none());
		assert_eq!(f.accounter.stats(), AccounterStats::default());
	}

	#[test]
	fn test_disabling_at_runtime_hides_existing_ban() {
		let f = fixture(opts(1, Duration::from_secs(60)));
		let ip = key("1.2.3.4");
		f.accounter.register_bad_action(&ip);
		assert!(f.accounter.is_banned(&ip));

		f.options.modify(|o| o.disabled = true).unwrap();
		assert!(!f.accounter.is_banned(&ip));

		f.options.modify(|o| o.disabled = false).unwrap();
		assert!(f.accounter.is_banned(&ip));
	}

	#[test]
	fn test_bans_on_exactly_the_limit() {
		let f = fixture(opts(3, Duration::from_secs(1)));
		let ip = key("1.2.3.4");

		f.accounter.register_bad_action(&ip);
		assert!(!f.accounter.is_banned(&ip));
		f.accounter.register_bad_action(&ip);
		assert!(!f.accounter.is_banned(&ip));
		f.accounter.register_bad_action(&ip);
		assert!(f.accounter.is_banned(&ip));

		assert!(f.accounter.was_bad_actions(&ip));
		assert!(f.accounter.bad_action_last_time(&ip).is_some());
		assert_eq!(f.accounter.stats().bans_issued, 1);
	}

	#[test]
	fn test_bad_action_during_ban_extends_it() {
		let f = fixture(opts(2, Duration::from_secs(10)));
		let ip = key("1.2.3.5");
		f.accounter.register_bad_action(&ip);
		f.accounter.register_bad_action(&ip);
		assert!(f.accounter.is_banned(&ip));

		f.clock.advance(Duration::from_secs(7));
		f.accounter.register_bad_action(&ip);
		let rec = f.accounter.snapshot(&ip).unwrap();
		assert_eq!(rec.bad_count, 0);
		assert_eq!(
			rec.ban_end_time,
			Some(f.accounter.current_time() + chrono::TimeDelta::seconds(10))
		);

		// Would have ended at 10s without the extension
		f.clock.advance(Duration::from_secs(7));
		assert!(f.accounter.is_banned(&ip));

		f.clock.advance(Duration::from_secs(4));
		assert!(!f.accounter.is_banned(&ip));
		assert_eq!(f.accounter.stats().bans_extended, 1);
	}

	#[test]
	fn test_escalation_after_ban_expires() {
		let f = fixture(BanAccounterOptions {
			ban_time_cache_store_multiplier: 3.0,
			limit_bad_multiplier_for_next_incident: 2.0,
			..opts(4, Duration::from_secs(10))
		});
		let ip = key("6.6.6.6");

		for _ in 0..3 {
			f.accounter.register_bad_action(&ip);
			assert!(!f.accounter.is_banned(&ip));
		}
		f.accounter.register_bad_action(&ip);
		assert!(f.accounter.is_banned(&ip));

		// Ban over, record still retained (retention is 30s)
		f.clock.advance(Duration::from_secs(11));
		assert!(!f.accounter.is_banned(&ip));

		f.accounter.register_bad_action(&ip);
		assert!(!f.accounter.is_banned(&ip));
		f.accounter.register_bad_action(&ip);
		assert!(f.accounter.is_banned(&ip));
		assert!((f.accounter.snapshot(&ip).unwrap().limit_multiplier - 4.0).abs() < f64::EPSILON);
	}

	#[test]
	fn test_fresh_cycle_after_ban_time() {
		let f = fixture(opts(3, Duration::from_secs(5)));
		let ip = key("7.7.7.7");
		for _ in 0..3 {
			f.accounter.register_bad_action(&ip);
		}
		assert!(f.accounter.is_banned(&ip));

		f.clock.advance(Duration::from_secs(6));
		assert!(!f.accounter.is_banned(&ip));

		f.accounter.register_bad_action(&ip);
		f.accounter.register_bad_action(&ip);
		assert!(!f.accounter.is_banned(&ip));
		f.accounter.register_bad_action(&ip);
		assert!(f.accounter.is_banned(&ip));
	}

	#[test]
	fn test_stale_count_decays() {
		let f = fixture(opts(3, Duration::from_secs(5)));
		let ip = key("8.8.8.8");
		f.accounter.register_bad_action(&ip);
		f.accounter.register_bad_action(&ip);

		// Keep the record alive with requests while the count goes stale
		f.clock.advance(Duration::from_secs(4));
		f.accounter.register_request(&ip);
		f.clock.advance(Duration::from_secs(4));

		f.accounter.register_bad_action(&ip);
		assert!(!f.accounter.is_banned(&ip));
		assert_eq!(f.accounter.snapshot(&ip).unwrap().bad_count, 1);
	}

	#[test]
	fn test_record_evicted_after_retention() {
		let f = fixture(opts(3, Duration::from_secs(5)));
		let ip = key("9.9.9.9");
		f.accounter.register_bad_action(&ip);

		f.clock.advance(Duration::from_secs(4));
		// Reads slide the retention too
		assert!(f.accounter.was_bad_actions(&ip));
		f.clock.advance(Duration::from_secs(4));
		assert!(f.accounter.was_bad_actions(&ip));

		f.clock.advance(Duration::from_secs(6));
		assert!(!f.accounter.was_bad_actions(&ip));
		assert!(f.accounter.snapshot(&ip).is_none());
	}

	#[test]
	fn test_ban_checks_alone_keep_record_alive() {
		let f = fixture(BanAccounterOptions {
			ban_time_cache_store_multiplier: 2.0,
			..opts(1, Duration::from_secs(5))
		});
		let ip = key("9.9.9.8");
		f.accounter.register_bad_action(&ip);

		// Ban over after 5s, retention 10s: only is_banned touches the record
		for _ in 0..6 {
			f.clock.advance(Duration::from_secs(6));
			assert!(!f.accounter.is_banned(&ip));
		}
		let rec = f.accounter.snapshot(&ip).unwrap();
		assert_eq!(rec.bad_count, 0);
		assert!(rec.ban_end_time.is_some());

		f.clock.advance(Duration::from_secs(10));
		assert!(!f.accounter.is_banned(&ip));
		assert!(f.accounter.snapshot(&ip).is_none());
	}

	#[test]
	fn test_ban_survives_until_its_last_nanosecond() {
		let f = fixture(opts(1, Duration::from_millis(300)));
		f.clock.set(DateTime::from_timestamp(1_700_000_000, 900_000).unwrap());
		let ip = key("9.9.9.7");

		f.accounter.register_bad_action(&ip);
		f.clock.advance(Duration::from_micros(299_500));
		assert!(f.accounter.is_banned(&ip));
		assert_eq!(f.accounter.ban_remaining(&ip), Some(Duration::from_micros(500)));

		f.clock.advance(Duration::from_micros(500));
		assert!(!f.accounter.is_banned(&ip));
	}

	#[test]
	fn test_sub_millisecond_ban_time() {
		let f = fixture(opts(1, Duration::from_micros(900)));
		let ip = key("9.9.9.6");

		f.accounter.register_bad_action(&ip);
		assert!(f.accounter.is_banned(&ip));
		f.clock.advance(Duration::from_micros(899));
		assert!(f.accounter.is_banned(&ip));
		f.clock.advance(Duration::from_micros(1));
		assert!(!f.accounter.is_banned(&ip));
	}

	#[test]
	fn test_time_comes_from_store_clock() {
		let f = fixture(opts(1, Duration::from_secs(60)));
		f.clock.advance(Duration::from_secs(3600));
		assert_eq!(f.accounter.current_time(), f.clock.now());
	}

	#[test]
	fn test_decrease_never_below_zero() {
		let f = fixture(opts(10, Duration::from_secs(60)));
		let ip = key("1.1.1.1");
		f.accounter.register_bad_action(&ip);
		f.accounter.register_bad_action(&ip);

		f.accounter.decrease_bad_action_count(&ip, 1);
		assert_eq!(f.accounter.snapshot(&ip).unwrap().bad_count, 1);
		f.accounter.decrease_bad_action_count(&ip, 3);
		assert_eq!(f.accounter.snapshot(&ip).unwrap().bad_count, 0);
		f.accounter.decrease_bad_action_count(&ip, 1);
		assert_eq!(f.accounter.snapshot(&ip).unwrap().bad_count, 0);

		// No record, nothing happens
		f.accounter.decrease_bad_action_count(&key("unknown"), 1);
		assert!(f.accounter.snapshot(&key("unknown")).is_none());
	}

	#[test]
	fn test_reset_keeps_ban_and_multiplier() {
		let f = fixture(BanAccounterOptions {
			limit_bad_multiplier_for_next_incident: 2.0,
			..opts(2, Duration::from_secs(60))
		});
		let ip = key("2.2.2.2");
		f.accounter.register_bad_action(&ip);
		f.accounter.register_bad_action(&ip);
		assert!(f.accounter.is_banned(&ip));

		f.accounter.reset_bad_action_count(&ip);
		let rec = f.accounter.snapshot(&ip).unwrap();
		assert_eq!(rec.bad_count, 0);
		assert!(f.accounter.is_banned(&ip));
		assert!((rec.limit_multiplier - 2.0).abs() < f64::EPSILON);
	}

	#[test]
	fn test_reset_restarts_count() {
		let f = fixture(opts(3, Duration::from_secs(60)));
		let ip = key("2.2.2.3");
		f.accounter.register_bad_action(&ip);
		f.accounter.register_bad_action(&ip);
		f.accounter.reset_bad_action_count(&ip);

		f.accounter.register_bad_action(&ip);
		f.accounter.register_bad_action(&ip);
		assert!(!f.accounter.is_banned(&ip));
	}

	#[test]
	fn test_unban_forgets_everything_even_when_disabled() {
		let f = fixture(BanAccounterOptions {
			limit_bad_multiplier_for_next_incident: 2.0,
			..opts(2, Duration::from_secs(60))
		});
		let ip = key("3.3.3.3");
		f.accounter.register_bad_action(&ip);
		f.accounter.register_bad_action(&ip);
		f.accounter.register_request(&ip);
		assert!(f.accounter.is_banned(&ip));

		f.options.modify(|o| o.disabled = true).unwrap();
		f.accounter.unban(&ip);
		f.options.modify(|o| o.disabled = false).unwrap();

		assert!(!f.accounter.is_banned(&ip));
		assert!(f.accounter.snapshot(&ip).is_none());
		assert!(f.accounter.request_last_time(&ip).is_none());

		// Multiplier is gone as well: a full cycle is needed again
		f.accounter.register_bad_action(&ip);
		assert!(!f.accounter.is_banned(&ip));
		f.accounter.register_bad_action(&ip);
		assert!(f.accounter.is_banned(&ip));
	}

	#[test]
	fn test_null_keys_ignored() {
		let clock = Arc::new(ManualClock::starting_now());
		let store: Arc<BanStore<Option<String>>> =
			Arc::new(MemoryStore::<ScopedKey<Option<String>>, RecordCell>::with_clock(clock.clone()));
		let options = Arc::new(OptionsMonitor::new(opts(1, Duration::from_secs(60))).unwrap());
		let accounter = BanAccounter::new("nulls", store, options.clone());

		accounter.register_bad_action(&None);
		accounter.register_request(&None);
		accounter.register_bad_action(&Some(String::new()));
		assert!(!accounter.is_banned(&None));
		assert!(accounter.request_last_time(&None).is_none());
		assert!(accounter.snapshot(&Some(String::new())).is_none());

		// With the policy off an empty key is just another key
		options.modify(|o| o.ignore_null_keys = false).unwrap();
		accounter.register_bad_action(&None);
		assert!(accounter.is_banned(&None));
	}

	#[test]
	fn test_request_tracking() {
		let f = fixture(opts(5, Duration::from_secs(2)));
		let k = key("req-key");

		assert!(f.accounter.request_last_time(&k).is_none());
		f.accounter.register_request(&k);
		assert_eq!(f.accounter.request_last_time(&k), Some(f.accounter.current_time()));

		// Requests do not count as bad actions
		assert!(!f.accounter.was_bad_actions(&k));
		assert_eq!(f.accounter.snapshot(&k).unwrap().bad_count, 0);
	}

	#[test]
	fn test_bad_action_last_time_passed() {
		let f = fixture(opts(5, Duration::from_secs(60)));
		let k = key("badtime-key");
		assert!(!f.accounter.was_bad_actions(&k));
		assert!(f.accounter.bad_action_last_time_passed(&k).is_none());

		f.accounter.register_bad_action(&k);
		f.clock.advance(Duration::from_millis(2500));
		assert_eq!(f.accounter.bad_action_last_time_passed(&k), Some(Duration::from_millis(2500)));
	}

	#[test]
	fn test_ban_remaining() {
		let f = fixture(opts(1, Duration::from_secs(30)));
		let k = key("remaining");
		assert!(f.accounter.ban_remaining(&k).is_none());

		f.accounter.register_bad_action(&k);
		f.clock.advance(Duration::from_secs(10));
		assert_eq!(f.accounter.ban_remaining(&k), Some(Duration::from_secs(20)));
	}

	#[test]
	fn test_namespaces_share_store_without_collision() {
		let clock = Arc::new(ManualClock::starting_now());
		let store: Arc<BanStore<String>> =
			Arc::new(MemoryStore::<ScopedKey<String>, RecordCell>::with_clock(clock.clone()));
		let options = Arc::new(OptionsMonitor::new(opts(1, Duration::from_secs(60))).unwrap());
		let login = BanAccounter::new("login", store.clone(), options.clone());
		let scraper = BanAccounter::new("scraper", store, options);
		let ip = key("4.4.4.4");

		login.register_bad_action(&ip);
		assert!(login.is_banned(&ip));
		assert!(!scraper.is_banned(&ip));

		scraper.unban(&ip);
		assert!(login.is_banned(&ip));
	}

	#[test]
	fn test_concurrent_bad_actions_ban_once() {
		let f = fixture(opts(10, Duration::from_secs(60)));
		let ip = key("5.5.5.5");

		std::thread::scope(|s| {
			for _ in 0..8 {
				s.spawn(|| {
					for _ in 0..25 {
						f.accounter.register_bad_action(&ip);
					}
				});
			}
		});

		let stats = f.accounter.stats();
		assert_eq!(stats.bad_actions_registered, 200);
		assert_eq!(stats.bans_issued, 1);
		assert_eq!(stats.bans_extended, 190);
		assert!(f.accounter.is_banned(&ip));
		assert_eq!(f.accounter.snapshot(&ip).unwrap().bad_count, 0);
	}

	#[test]
	fn test_ban_trigger_is_logged() {
		let _ = tracing_subscriber::fmt().with_test_writer().try_init();
		let f = fixture(opts(1, Duration::from_secs(60)));
		f.accounter.register_bad_action(&key("logged"));
		assert!(f.accounter.is_banned(&key("logged")));
	}
}

// vim: ts=4
