//! Key scoping
//!
//! Several accounters may share one physical store. Each accounter is given a
//! [`Namespace`] when it is constructed and every key it touches is stored as
//! a [`ScopedKey`] of that namespace and the caller's key value.

use std::fmt;
use std::hash::Hash;
use std::net::IpAddr;
use std::sync::Arc;

/// A key that can identify an offender (IP address, account id, ...)
///
/// `is_null` marks values that the `ignoreNullKeys` policy treats as
/// "no key at all": `None`, empty strings, and tuples containing such parts.
pub trait BanKey: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {
	fn is_null(&self) -> bool {
		false
	}
}

impl BanKey for String {
	fn is_null(&self) -> bool {
		self.is_empty()
	}
}

impl BanKey for Box<str> {
	fn is_null(&self) -> bool {
		self.is_empty()
	}
}

impl BanKey for Arc<str> {
	fn is_null(&self) -> bool {
		self.is_empty()
	}
}

impl BanKey for &'static str {
	fn is_null(&self) -> bool {
		self.is_empty()
	}
}

impl BanKey for IpAddr {}
impl BanKey for u32 {}
impl BanKey for u64 {}
impl BanKey for i64 {}

impl<T: BanKey> BanKey for Option<T> {
	fn is_null(&self) -> bool {
		self.as_ref().is_none_or(BanKey::is_null)
	}
}

impl<A: BanKey, B: BanKey> BanKey for (A, B) {
	fn is_null(&self) -> bool {
		self.0.is_null() || self.1.is_null()
	}
}

/// Identifies one accounter inside a shared store
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Namespace(Arc<str>);

impl Namespace {
	pub fn new(name: impl Into<Arc<str>>) -> Self {
		Self(name.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl From<&str> for Namespace {
	fn from(name: &str) -> Self {
		Self::new(name)
	}
}

impl From<String> for Namespace {
	fn from(name: String) -> Self {
		Self::new(name)
	}
}

impl fmt::Debug for Namespace {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Namespace({})", self.0)
	}
}

impl fmt::Display for Namespace {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Effective storage key: (namespace, key value)
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScopedKey<K> {
	pub namespace: Namespace,
	pub key: K,
}

impl<K> ScopedKey<K> {
	pub fn new(namespace: Namespace, key: K) -> Self {
		Self { namespace, key }
	}
}


// vim: ts=4
