//! Banhammer demo server
//!
//! Configured through `BANHAMMER_*` environment variables, log level through
//! `RUST_LOG`.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

mod config;
mod routes;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use banhammer::antiparser::ConnectionAddrs;
use banhammer::error::BhResult;

use crate::config::Config;
use crate::routes::{AppState, Store};

const EVICTION_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> BhResult<()> {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_target(false)
		.init();

	let config = Config::from_env()?;
	info!(
		"Scraping guard: limit {}, ban {:?}; login guard: limit {}, ban {:?}",
		config.antiparser.accounter.bad_count_limit,
		config.antiparser.accounter.ban_time,
		config.login.bad_count_limit,
		config.login.ban_time
	);

	let store = Arc::new(Store::new());
	let eviction = store.spawn_eviction_task(EVICTION_INTERVAL);
	let app = routes::router(AppState::new(&config, store)?);

	let listener = tokio::net::TcpListener::bind(config.listen).await?;
	info!("Listening on {}", config.listen);
	axum::serve(listener, app.into_make_service_with_connect_info::<ConnectionAddrs>()).await?;

	eviction.abort();
	Ok(())
}

// vim: ts=4
