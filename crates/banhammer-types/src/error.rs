//! Error types
//!
//! The ban engine itself never fails at runtime. Errors only surface while
//! validating or loading configuration.

use std::fmt;

pub type BhResult<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
	/// An option value is out of its allowed range
	ValidationError(String),

	/// Configuration could not be loaded (missing or malformed source)
	ConfigError(String),

	/// A value could not be parsed
	Parse,

	/// I/O failure outside the engine (binding a listener, serving)
	Io(String),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::ValidationError(msg) => write!(f, "Validation error: {}", msg),
			Error::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
			Error::Parse => write!(f, "Parse error"),
			Error::Io(msg) => write!(f, "I/O error: {}", msg),
		}
	}
}

impl std::error::Error for Error {}

impl From<std::num::ParseIntError> for Error {
	fn from(_err: std::num::ParseIntError) -> Self {
		Error::Parse
	}
}

impl From<std::num::ParseFloatError> for Error {
	fn from(_err: std::num::ParseFloatError) -> Self {
		Error::Parse
	}
}

impl From<std::net::AddrParseError> for Error {
	fn from(_err: std::net::AddrParseError) -> Self {
		Error::Parse
	}
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Error::Io(err.to_string())
	}
}


// vim: ts=4
