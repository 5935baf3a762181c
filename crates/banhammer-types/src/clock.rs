//! Clock abstraction
//!
//! Every operation reads the current UTC time exactly once through a [`Clock`].
//! Production code uses [`SystemClock`]; tests drive a [`ManualClock`] so that
//! ban windows and retention can be crossed without sleeping.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

/// Source of the current UTC time
pub trait Clock: Send + Sync {
	fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
	now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
	pub fn new(now: DateTime<Utc>) -> Self {
		Self { now: Mutex::new(now) }
	}

	/// Start at the current wall clock time
	pub fn starting_now() -> Self {
		Self::new(Utc::now())
	}

	pub fn set(&self, now: DateTime<Utc>) {
		*self.now.lock() = now;
	}

	pub fn advance(&self, by: Duration) {
		let mut now = self.now.lock();
		*now = add_duration(*now, by);
	}
}

impl Clock for ManualClock {
	fn now(&self) -> DateTime<Utc> {
		*self.now.lock()
	}
}

/// Convert a std duration to a chrono delta, saturating at the largest delta
pub fn to_time_delta(duration: Duration) -> TimeDelta {
	TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

/// `time + duration`, saturating at the maximum representable time
pub fn add_duration(time: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
	time.checked_add_signed(to_time_delta(duration)).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Time passed from `earlier` to `later`, zero if `later` is not after `earlier`
pub fn elapsed_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> Duration {
	(later - earlier).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_manual_clock_advance() {
		let start = Utc::now();
		let clock = ManualClock::new(start);
		assert_eq!(clock.now(), start);

		clock.advance(Duration::from_millis(1500));
		assert_eq!(clock.now() - start, TimeDelta::milliseconds(1500));
	}

	#[test]
	fn test_manual_clock_set() {
		let clock = ManualClock::starting_now();
		let target = DateTime::<Utc>::UNIX_EPOCH;
		clock.set(target);
		assert_eq!(clock.now(), target);
	}

	#[test]
	fn test_add_duration_saturates() {
		let t = Utc::now();
		assert_eq!(add_duration(t, Duration::MAX), DateTime::<Utc>::MAX_UTC);
		assert_eq!(add_duration(t, Duration::from_secs(60)) - t, TimeDelta::seconds(60));
	}

	#[test]
	fn test_elapsed_between() {
		let t = Utc::now();
		let later = t + TimeDelta::seconds(3);
		assert_eq!(elapsed_between(t, later), Duration::from_secs(3));
		// Clock went backwards
		assert_eq!(elapsed_between(later, t), Duration::ZERO);
	}
}

// vim: ts=4
