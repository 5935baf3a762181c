//! Anti-scraping request heuristic for Banhammer.
//!
//! Bans clients that fire requests faster than a human would. The
//! [`AntiparserLayer`] resolves the client address (honouring trusted reverse
//! proxies), rejects banned clients and feeds request timing into a
//! [`BanAccounter`](banhammer_core::BanAccounter).

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod antiparser;
pub mod client_ip;
pub mod error;
pub mod layer;
pub mod options;

pub use antiparser::{Antiparser, AntiparserAccounter, Verdict};
pub use client_ip::{
	ConnectionAddrs, connection_addrs, extract_client_ip, resolve_client_ip, resolve_connection_ip,
};
pub use error::BanRejection;
pub use layer::{AntiparserLayer, AntiparserService, KeyExtractor, client_ip_key};
pub use options::AntiparserOptions;

// vim: ts=4
