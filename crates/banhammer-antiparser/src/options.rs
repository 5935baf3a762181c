//! Antiparser options
//!
//! The accounter options are embedded, so one options snapshot drives both
//! the accounter and the request heuristic. Defaults are tuned for request
//! counting rather than for explicit bad actions: a much higher limit, a
//! longer ban and progressive escalation.

use std::net::IpAddr;
use std::time::Duration;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};

use banhammer_core::options::{BanAccounterOptions, Validate};
use banhammer_types::prelude::*;

#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawAntiparserOptions")]
pub struct AntiparserOptions {
	#[serde(flatten)]
	pub accounter: BanAccounterOptions,

	/// Run the timing heuristic after every served request
	pub register_bad_action_on_action_executed: bool,

	/// A request arriving sooner than this after the previous one is a bad action
	#[serde_as(as = "DurationMilliSeconds<u64>")]
	pub register_bad_action_if_previous_request_is_less: Duration,

	/// When the last bad action is older than this, the count goes down by one
	#[serde_as(as = "DurationMilliSeconds<u64>")]
	pub decrease_counter_if_previous_request_is_more: Duration,

	/// Status returned to banned clients
	pub default_ban_status_code: u16,

	/// Reverse proxies whose X-Forwarded-For headers are trusted
	pub reverse_proxy_ips: Vec<IpAddr>,

	/// Also trust the server's own address of the connection as a proxy.
	/// Only safe when the server itself appends the client to the header.
	pub add_local_ip_address_to_proxy_list: bool,
}

impl Default for AntiparserOptions {
	fn default() -> Self {
		Self {
			accounter: BanAccounterOptions {
				bad_count_limit: 150,
				ban_time: Duration::from_secs(5 * 60),
				ban_time_cache_store_multiplier: 2.0,
				limit_bad_multiplier_for_next_incident: 1.15,
				..Default::default()
			},
			register_bad_action_on_action_executed: true,
			register_bad_action_if_previous_request_is_less: Duration::from_millis(1500),
			decrease_counter_if_previous_request_is_more: Duration::from_secs(30),
			default_ban_status_code: StatusCode::TOO_MANY_REQUESTS.as_u16(),
			reverse_proxy_ips: Vec::new(),
			add_local_ip_address_to_proxy_list: false,
		}
	}
}

impl AntiparserOptions {
	/// Status for banned clients, 429 if the configured code is unusable
	pub fn ban_status(&self) -> StatusCode {
		StatusCode::from_u16(self.default_ban_status_code).unwrap_or(StatusCode::TOO_MANY_REQUESTS)
	}
}

impl AsRef<BanAccounterOptions> for AntiparserOptions {
	fn as_ref(&self) -> &BanAccounterOptions {
		&self.accounter
	}
}

impl Validate for AntiparserOptions {
	fn validate(&self) -> BhResult<()> {
		self.accounter.validate()?;
		if StatusCode::from_u16(self.default_ban_status_code).is_err() {
			return Err(Error::ValidationError(format!(
				"defaultBanStatusCode {} is not a valid HTTP status",
				self.default_ban_status_code
			)));
		}
		Ok(())
	}
}

/// Wire form: every field optional, missing ones fall back to the
/// antiparser defaults (not the plain accounter defaults).
#[serde_as]
#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawAntiparserOptions {
	disabled: Option<bool>,
	bad_count_limit: Option<u32>,
	#[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
	ban_time: Option<Duration>,
	ban_time_cache_store_multiplier: Option<f64>,
	limit_bad_multiplier_for_next_incident: Option<f64>,
	ignore_null_keys: Option<bool>,

	register_bad_action_on_action_executed: Option<bool>,
	#[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
	register_bad_action_if_previous_request_is_less: Option<Duration>,
	#[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
	decrease_counter_if_previous_request_is_more: Option<Duration>,
	default_ban_status_code: Option<u16>,
	reverse_proxy_ips: Option<Vec<IpAddr>>,
	add_local_ip_address_to_proxy_list: Option<bool>,
}

impl From<RawAntiparserOptions> for AntiparserOptions {
	fn from(raw: RawAntiparserOptions) -> Self {
		let mut opts = AntiparserOptions::default();
		let acc = &mut opts.accounter;

		if let Some(v) = raw.disabled {
			acc.disabled = v;
		}
		if let Some(v) = raw.bad_count_limit {
			acc.bad_count_limit = v;
		}
		if let Some(v) = raw.ban_time {
			acc.ban_time = v;
		}
		if let Some(v) = raw.ban_time_cache_store_multiplier {
			acc.ban_time_cache_store_multiplier = v;
		}
		if let Some(v) = raw.limit_bad_multiplier_for_next_incident {
			acc.limit_bad_multiplier_for_next_incident = v;
		}
		if let Some(v) = raw.ignore_null_keys {
			acc.ignore_null_keys = v;
		}

		if let Some(v) = raw.register_bad_action_on_action_executed {
			opts.register_bad_action_on_action_executed = v;
		}
		if let Some(v) = raw.register_bad_action_if_previous_request_is_less {
			opts.register_bad_action_if_previous_request_is_less = v;
		}
		if let Some(v) = raw.decrease_counter_if_previous_request_is_more {
			opts.decrease_counter_if_previous_request_is_more = v;
		}
		if let Some(v) = raw.default_ban_status_code {
			opts.default_ban_status_code = v;
		}
		if let Some(v) = raw.reverse_proxy_ips {
			opts.reverse_proxy_ips = v;
		}
		if let Some(v) = raw.add_local_ip_address_to_proxy_list {
			opts.add_local_ip_address_to_proxy_list = v;
		}
		opts
	}
}


// vim: ts=4
