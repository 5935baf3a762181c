//! Shared types, adapter traits, and core utilities for the Banhammer ban engine.
//!
//! This crate contains the foundational types shared between the core
//! accounter, the store adapters and the request-level consumers, so that
//! adapter crates do not depend on the engine itself.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod clock;
pub mod error;
pub mod key;
pub mod prelude;
pub mod store_adapter;

// vim: ts=4
