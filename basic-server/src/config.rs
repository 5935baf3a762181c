//! Server configuration from `BANHAMMER_*` environment variables

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use banhammer::antiparser::AntiparserOptions;
use banhammer::prelude::*;

const DEFAULT_LISTEN: &str = "127.0.0.1:3000";
const DEFAULT_PASSWORD: &str = "hunter2";

#[derive(Debug, Clone)]
pub struct Config {
	pub listen: SocketAddr,
	pub login_password: String,
	/// Options of the scraping guard
	pub antiparser: AntiparserOptions,
	/// Options of the login brute-force guard
	pub login: BanAccounterOptions,
}

fn parse_bool(name: &str, value: &str) -> BhResult<bool> {
	match value.trim().to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Ok(true),
		"0" | "false" | "no" | "off" => Ok(false),
		_ => Err(Error::ConfigError(format!("{} must be a boolean, got {:?}", name, value))),
	}
}

fn parse_ip_list(value: &str) -> BhResult<Vec<IpAddr>> {
	value
		.split(',')
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.map(|s| Ok(s.parse::<IpAddr>()?))
		.collect()
}

impl Config {
	pub fn from_env() -> BhResult<Self> {
		Self::from_lookup(|name| env::var(name).ok())
	}

	/// Build the configuration from any variable source
	pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> BhResult<Self> {
		let listen: SocketAddr =
			get("BANHAMMER_LISTEN").unwrap_or_else(|| DEFAULT_LISTEN.to_string()).parse()?;
		let login_password =
			get("BANHAMMER_LOGIN_PASSWORD").unwrap_or_else(|| DEFAULT_PASSWORD.to_string());

		let mut antiparser = AntiparserOptions::default();
		let mut login = BanAccounterOptions::default();
		let acc = &mut antiparser.accounter;

		if let Some(v) = get("BANHAMMER_BAD_COUNT_LIMIT") {
			acc.bad_count_limit = v.trim().parse()?;
		}
		if let Some(v) = get("BANHAMMER_BAN_TIME_MS") {
			acc.ban_time = Duration::from_millis(v.trim().parse()?);
		}
		if let Some(v) = get("BANHAMMER_STORE_MULTIPLIER") {
			acc.ban_time_cache_store_multiplier = v.trim().parse()?;
		}
		if let Some(v) = get("BANHAMMER_ESCALATION") {
			acc.limit_bad_multiplier_for_next_incident = v.trim().parse()?;
		}
		if let Some(v) = get("BANHAMMER_DISABLED") {
			let disabled = parse_bool("BANHAMMER_DISABLED", &v)?;
			acc.disabled = disabled;
			login.disabled = disabled;
		}
		if let Some(v) = get("BANHAMMER_REVERSE_PROXIES") {
			antiparser.reverse_proxy_ips = parse_ip_list(&v)?;
		}
		if let Some(v) = get("BANHAMMER_TRUST_LOCAL_ADDRESS") {
			antiparser.add_local_ip_address_to_proxy_list =
				parse_bool("BANHAMMER_TRUST_LOCAL_ADDRESS", &v)?;
		}

		antiparser.validate()?;
		login.validate()?;
		Ok(Self { listen, login_password, antiparser, login })
	}
}


// vim: ts=4
