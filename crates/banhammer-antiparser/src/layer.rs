//! Antiparser Middleware
//!
//! Tower middleware layer guarding Axum routes with the [`Antiparser`].

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::response::IntoResponse;
use futures::future::BoxFuture;
use hyper::Request;
use tower::{Layer, Service};

use crate::antiparser::{Antiparser, Verdict};
use crate::client_ip::extract_client_ip;
use crate::error::BanRejection;
use crate::options::AntiparserOptions;

/// Derives the ban key of a request
pub type KeyExtractor =
	Arc<dyn Fn(&Request<Body>, &AntiparserOptions) -> Option<String> + Send + Sync>;

/// Default key: the client IP, honouring X-Forwarded-For from the configured reverse proxies
pub fn client_ip_key(req: &Request<Body>, opts: &AntiparserOptions) -> Option<String> {
	extract_client_ip(req, opts).map(|ip| ip.to_string())
}

/// Antiparser middleware layer
#[derive(Clone)]
pub struct AntiparserLayer {
	antiparser: Arc<Antiparser>,
	key_extractor: KeyExtractor,
}

impl AntiparserLayer {
	pub fn new(antiparser: Arc<Antiparser>) -> Self {
		Self { antiparser, key_extractor: Arc::new(client_ip_key) }
	}

	/// Use a custom key, e.g. IP plus User-Agent
	pub fn with_key_extractor<F>(mut self, extractor: F) -> Self
	where
		F: Fn(&Request<Body>, &AntiparserOptions) -> Option<String> + Send + Sync + 'static,
	{
		self.key_extractor = Arc::new(extractor);
		self
	}
}

impl<S> Layer<S> for AntiparserLayer {
	type Service = AntiparserService<S>;

	fn layer(&self, inner: S) -> Self::Service {
		AntiparserService {
			inner,
			antiparser: self.antiparser.clone(),
			key_extractor: self.key_extractor.clone(),
		}
	}
}

/// Antiparser middleware service
#[derive(Clone)]
pub struct AntiparserService<S> {
	inner: S,
	antiparser: Arc<Antiparser>,
	key_extractor: KeyExtractor,
}

impl<S> Service<Request<Body>> for AntiparserService<S>
where
	S: Service<Request<Body>, Response = axum::response::Response> + Clone + Send + 'static,
	S::Future: Send + 'static,
{
	type Response = S::Response;
	type Error = S::Error;
	type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

	fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.inner.poll_ready(cx)
	}

	fn call(&mut self, req: Request<Body>) -> Self::Future {
		let antiparser = self.antiparser.clone();
		let key_extractor = self.key_extractor.clone();
		let mut inner = self.inner.clone();

		Box::pin(async move {
			let key = key_extractor(&req, &antiparser.options());

			if let Verdict::Banned { status, retry_after } = antiparser.check(&key) {
				// Rejected requests are not registered
				return Ok(BanRejection { status, retry_after }.into_response());
			}

			let res = inner.call(req).await;
			antiparser.on_request_executed(&key);
			res
		})
	}
}


// vim: ts=4
