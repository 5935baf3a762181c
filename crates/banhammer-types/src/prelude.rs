pub use crate::clock::{Clock, SystemClock};
pub use crate::error::{BhResult, Error};
pub use crate::key::{BanKey, Namespace, ScopedKey};
pub use crate::store_adapter::ExpiringStore;

// vim: ts=4
