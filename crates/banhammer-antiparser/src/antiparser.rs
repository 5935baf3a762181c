//! Request timing heuristic
//!
//! Every served request is remembered. A request arriving too soon after the
//! previous one from the same client counts as a bad action; a client whose
//! last bad action is long past slowly earns its count back. Counting every
//! request would eventually ban a normal visitor, so only bursts are counted.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use tracing::trace;

use banhammer_core::BanAccounter;
use banhammer_types::clock::elapsed_between;

use crate::options::AntiparserOptions;

/// Accounter keyed by client identifier (usually the resolved IP); `None`
/// when the request carries no usable identifier.
pub type AntiparserAccounter = BanAccounter<Option<String>, AntiparserOptions>;

/// Decision for an incoming request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
	Allowed,
	Banned { status: StatusCode, retry_after: Duration },
}

pub struct Antiparser {
	accounter: Arc<AntiparserAccounter>,
	status_override: Option<StatusCode>,
}

impl Antiparser {
	pub fn new(accounter: Arc<AntiparserAccounter>) -> Self {
		Self { accounter, status_override: None }
	}

	/// Answer banned clients with `status` instead of the configured default
	pub fn with_status(mut self, status: StatusCode) -> Self {
		self.status_override = Some(status);
		self
	}

	pub fn accounter(&self) -> &AntiparserAccounter {
		&self.accounter
	}

	pub fn options(&self) -> Arc<AntiparserOptions> {
		self.accounter.options()
	}

	/// Check a request before it is served
	pub fn check(&self, key: &Option<String>) -> Verdict {
		match self.accounter.ban_remaining(key) {
			Some(retry_after) => {
				let status = self.status_override.unwrap_or_else(|| self.options().ban_status());
				Verdict::Banned { status, retry_after }
			}
			None => Verdict::Allowed,
		}
	}

	/// Record a served request and apply the timing heuristic
	pub fn on_request_executed(&self, key: &Option<String>) {
		let opts = self.options();
		if !opts.register_bad_action_on_action_executed {
			return;
		}

		let now = self.accounter.current_time();
		let too_fast = self.accounter.request_last_time(key).is_some_and(|last| {
			elapsed_between(last, now) < opts.register_bad_action_if_previous_request_is_less
		});

		if too_fast {
			trace!("Request burst from {:?}", key);
			self.accounter.register_bad_action(key);
		} else if self
			.accounter
			.bad_action_last_time_passed(key)
			.is_some_and(|passed| passed > opts.decrease_counter_if_previous_request_is_more)
		{
			trace!("Calm client {:?}, decreasing bad count", key);
			self.accounter.decrease_bad_action_count(key, 1);
		}

		self.accounter.register_request(key);
	}
}


// vim: ts=4
