//! Per-key ban state and the bad-action decision algorithm

use chrono::{DateTime, Utc};

use banhammer_types::clock::{add_duration, elapsed_between};

use crate::options::BanAccounterOptions;

/// Mutable state of one key. Owned by a single store entry and always
/// accessed under that entry's mutex.
#[derive(Clone, Debug, PartialEq)]
pub struct BanRecord {
	/// Bad actions since the last reset, decay or ban
	pub bad_count: u32,

	/// Divides the configured limit; grows with every ban when escalation is enabled
	pub limit_multiplier: f64,

	/// The key is banned while this lies in the future
	pub ban_end_time: Option<DateTime<Utc>>,

	pub bad_action_last_time: Option<DateTime<Utc>>,

	/// Last "request seen" registration. Not counted towards bans.
	pub request_last_time: Option<DateTime<Utc>>,
}

impl Default for BanRecord {
	fn default() -> Self {
		Self {
			bad_count: 0,
			limit_multiplier: 1.0,
			ban_end_time: None,
			bad_action_last_time: None,
			request_last_time: None,
		}
	}
}

/// Result of registering one bad action
#[derive(Clone, Debug, PartialEq)]
pub enum BadActionOutcome {
	/// Counted, still under the limit
	Counted { bad_count: u32 },
	/// The limit was reached and a new ban started
	Banned { until: DateTime<Utc>, limit_multiplier: f64 },
	/// The key was already banned; the ban now ends later
	Extended { until: DateTime<Utc> },
}

impl BanRecord {
	pub fn ban_is_active(&self, now: DateTime<Utc>) -> bool {
		self.ban_end_time.is_some_and(|end| end > now)
	}

	/// Time left on an active ban
	pub fn ban_remaining(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
		self.ban_end_time.filter(|end| *end > now).map(|end| elapsed_between(now, end))
	}

	/// Register one bad action at `now`.
	///
	/// An idle count decays first, then the count is incremented while under the
	/// limit, and reaching the limit bans in the same call. Bad actions during an
	/// active ban push the ban end forward instead of counting.
	pub fn register_bad_action(
		&mut self,
		now: DateTime<Utc>,
		opts: &BanAccounterOptions,
	) -> BadActionOutcome {
		let ban_active = self.ban_is_active(now);

		if self.bad_action_last_time.is_some_and(|last| add_duration(last, opts.ban_time) < now) {
			self.bad_count = 0;
		}

		let limit = opts.effective_limit(self.limit_multiplier);

		if !ban_active && f64::from(self.bad_count) < limit {
			self.bad_count += 1;
		}

		let outcome = if !ban_active && f64::from(self.bad_count) >= limit {
			let until = add_duration(now, opts.ban_time);
			self.bad_count = 0;
			self.ban_end_time = Some(until);
			if opts.limit_bad_multiplier_for_next_incident > 1.0 {
				self.limit_multiplier *= opts.limit_bad_multiplier_for_next_incident;
			}
			BadActionOutcome::Banned { until, limit_multiplier: self.limit_multiplier }
		} else if ban_active {
			let until = add_duration(now, opts.ban_time);
			self.ban_end_time = Some(until);
			BadActionOutcome::Extended { until }
		} else {
			BadActionOutcome::Counted { bad_count: self.bad_count }
		};

		self.bad_action_last_time = Some(now);
		outcome
	}

	pub fn decrease_bad_count(&mut self, count: u32) {
		self.bad_count = self.bad_count.saturating_sub(count);
	}
}


// vim: ts=4
