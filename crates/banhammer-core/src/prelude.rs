pub use banhammer_types::prelude::*;

pub use crate::accounter::{AccounterStats, BanAccounter, BanStore, RecordCell};
pub use crate::options::{BanAccounterOptions, OptionsMonitor, Validate};
pub use crate::record::{BadActionOutcome, BanRecord};

// vim: ts=4
