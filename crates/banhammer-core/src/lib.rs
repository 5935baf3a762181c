//! Core ban engine for Banhammer.
//!
//! A [`BanAccounter`] counts bad actions per key, bans a key once its count
//! reaches the configured limit and lowers the limit for repeat offenders.
//! Records live in any [`ExpiringStore`](banhammer_types::store_adapter::ExpiringStore);
//! options are read through an [`OptionsMonitor`] so they can be reloaded at runtime.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod accounter;
pub mod options;
pub mod prelude;
pub mod record;

// Re-export commonly used types
pub use accounter::{AccounterStats, BanAccounter, BanStore, RecordCell};
pub use options::{BanAccounterOptions, OptionsMonitor, Validate};
pub use record::{BadActionOutcome, BanRecord};

// vim: ts=4
