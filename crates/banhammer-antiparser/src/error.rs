//! Ban rejection response

use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Response sent instead of serving a banned client
#[derive(Debug)]
pub struct BanRejection {
	pub status: StatusCode,
	pub retry_after: Duration,
}

impl BanRejection {
	/// Whole seconds until the ban ends, rounded up
	pub fn retry_after_secs(&self) -> u64 {
		self.retry_after.as_secs() + u64::from(self.retry_after.subsec_nanos() > 0)
	}
}

impl std::fmt::Display for BanRejection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Client banned for another {:?}", self.retry_after)
	}
}

impl std::error::Error for BanRejection {}

impl IntoResponse for BanRejection {
	fn into_response(self) -> Response {
		let retry_secs = self.retry_after_secs();
		let body = serde_json::json!({
			"error": {
				"code": "E-BANNED",
				"message": "Access temporarily blocked due to too frequent requests.",
				"details": {
					"retryAfter": retry_secs
				}
			}
		});

		let mut response = (self.status, Json(body)).into_response();
		if let Ok(val) = retry_secs.to_string().parse() {
			response.headers_mut().insert("Retry-After", val);
		}
		response
	}
}


// vim: ts=4
