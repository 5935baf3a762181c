//! Ban accounter options and the live options monitor

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::debug;

use crate::prelude::*;

/// Options validated before they become visible to an accounter
pub trait Validate {
	fn validate(&self) -> BhResult<()>;
}

/// Options of a single accounter.
///
/// Deserializes from camelCase keys; `banTime` is given in milliseconds and
/// every missing field takes its default.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BanAccounterOptions {
	/// Do not register anything and report every key as not banned
	pub disabled: bool,

	/// Bad actions tolerated before a key is banned
	pub bad_count_limit: u32,

	/// Ban duration. Also the window after which an idle bad-action count decays to zero.
	#[serde_as(as = "DurationMilliSeconds<u64>")]
	pub ban_time: Duration,

	/// Records are retained for `ban_time` times this value after their last access
	pub ban_time_cache_store_multiplier: f64,

	/// Divides the effective limit of a key each time it gets banned (applied when > 1)
	pub limit_bad_multiplier_for_next_incident: f64,

	/// Treat null/empty keys as "no key": never banned, never registered
	pub ignore_null_keys: bool,
}

impl Default for BanAccounterOptions {
	fn default() -> Self {
		Self {
			disabled: false,
			bad_count_limit: 5,
			ban_time: Duration::from_secs(60),
			ban_time_cache_store_multiplier: 1.0,
			limit_bad_multiplier_for_next_incident: 1.0,
			ignore_null_keys: true,
		}
	}
}

impl BanAccounterOptions {
	/// Sliding retention of a record in the store, never shorter than `ban_time`
	pub fn retention(&self) -> Duration {
		Duration::try_from_secs_f64(self.ban_time.as_secs_f64() * self.ban_time_cache_store_multiplier)
			.unwrap_or(Duration::MAX)
			.max(self.ban_time)
	}

	/// Threshold a record's bad count is compared against
	pub fn effective_limit(&self, limit_multiplier: f64) -> f64 {
		f64::from(self.bad_count_limit) / limit_multiplier
	}

	/// Whether the null-key policy short-circuits this key
	pub fn skips_key<K: BanKey>(&self, key: &K) -> bool {
		self.ignore_null_keys && key.is_null()
	}

	/// Whether registrations for this key are accepted
	pub fn can_register<K: BanKey>(&self, key: &K) -> bool {
		!self.disabled && !self.skips_key(key)
	}
}

fn check_multiplier(name: &str, value: f64) -> BhResult<()> {
	if value.is_finite() && value >= 1.0 {
		Ok(())
	} else {
		Err(Error::ValidationError(format!("{} must be a finite number >= 1, got {}", name, value)))
	}
}

impl Validate for BanAccounterOptions {
	fn validate(&self) -> BhResult<()> {
		if self.ban_time.is_zero() {
			return Err(Error::ValidationError("banTime must be positive".to_string()));
		}
		check_multiplier("banTimeCacheStoreMultiplier", self.ban_time_cache_store_multiplier)?;
		check_multiplier(
			"limitBadMultiplierForNextIncident",
			self.limit_bad_multiplier_for_next_incident,
		)?;
		Ok(())
	}
}

impl AsRef<BanAccounterOptions> for BanAccounterOptions {
	fn as_ref(&self) -> &BanAccounterOptions {
		self
	}
}

/// Live, swappable options snapshot.
///
/// Readers get an `Arc` to an immutable snapshot and keep using it for the
/// whole operation; writers replace the snapshot atomically.
#[derive(Debug)]
pub struct OptionsMonitor<T> {
	current: RwLock<Arc<T>>,
}

impl<T: Validate> OptionsMonitor<T> {
	pub fn new(options: T) -> BhResult<Self> {
		options.validate()?;
		Ok(Self { current: RwLock::new(Arc::new(options)) })
	}

	/// Current snapshot
	pub fn current(&self) -> Arc<T> {
		Arc::clone(&self.current.read())
	}

	/// Replace the snapshot. Invalid options are rejected and the old snapshot stays.
	pub fn update(&self, options: T) -> BhResult<()> {
		options.validate()?;
		*self.current.write() = Arc::new(options);
		debug!("Options snapshot replaced");
		Ok(())
	}

	/// Derive a new snapshot from the current one
	pub fn modify(&self, f: impl FnOnce(&mut T)) -> BhResult<()>
	where
		T: Clone,
	{
		let mut current = self.current.write();
		let mut next = T::clone(&current);
		f(&mut next);
		next.validate()?;
		*current = Arc::new(next);
		debug!("Options snapshot modified");
		Ok(())
	}
}

impl<T: Validate + Default> Default for OptionsMonitor<T> {
	fn default() -> Self {
		Self { current: RwLock::new(Arc::new(T::default())) }
	}
}


// vim: ts=4
