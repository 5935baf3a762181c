//! Banhammer is an in-process abuse counter and ban engine.
//!
//! # Features
//!
//! - Per-key bad-action counting with temporary bans
//!     - bans are extended while the offender keeps misbehaving
//!     - idle counts decay after one ban window
//!     - repeat offenders get a lower limit (progressive escalation)
//! - Sliding-expiry in-memory store, shareable between accounters via namespaces
//! - Live options reload
//! - Anti-scraping heuristic with a tower layer for axum
//!     - client IP resolution honouring trusted reverse proxies

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub use banhammer_types::clock;
pub use banhammer_types::error;
pub use banhammer_types::key;
pub use banhammer_types::store_adapter;

pub use banhammer_core::accounter;
pub use banhammer_core::options;
pub use banhammer_core::record;

pub use banhammer_antiparser as antiparser;
pub use banhammer_store_adapter_memory as store_adapter_memory;

pub use banhammer_core::{
	AccounterStats, BadActionOutcome, BanAccounter, BanAccounterOptions, BanRecord, BanStore,
	OptionsMonitor, RecordCell, Validate,
};
pub use banhammer_store_adapter_memory::MemoryStore;

pub mod prelude {
	pub use banhammer_core::prelude::*;
	pub use banhammer_store_adapter_memory::MemoryStore;
}

// vim: ts=4
