//! HTTP routes of the demo server
//!
//! `/` and `/page` are guarded against scraping, `/open` is not. `/login`
//! bans clients guessing the password. Both guards keep their records in one
//! shared store under different namespaces.

use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use banhammer::antiparser::{
	Antiparser, AntiparserAccounter, AntiparserLayer, BanRejection, ConnectionAddrs,
	resolve_connection_ip,
};
use banhammer::key::ScopedKey;
use banhammer::prelude::*;

use crate::config::Config;

/// Store shared by both guards
pub type Store = MemoryStore<ScopedKey<Option<String>>, RecordCell>;

#[derive(Clone)]
pub struct AppState {
	pub antiparser: Arc<Antiparser>,
	pub login_guard: Arc<BanAccounter<Option<String>>>,
	pub login_password: Arc<str>,
}

impl AppState {
	pub fn new(config: &Config, store: Arc<Store>) -> BhResult<Self> {
		let antiparser = AntiparserAccounter::new(
			"antiparser",
			store.clone(),
			Arc::new(OptionsMonitor::new(config.antiparser.clone())?),
		);
		let login_guard =
			BanAccounter::new("login", store, Arc::new(OptionsMonitor::new(config.login.clone())?));

		Ok(Self {
			antiparser: Arc::new(Antiparser::new(Arc::new(antiparser))),
			login_guard: Arc::new(login_guard),
			login_password: config.login_password.as_str().into(),
		})
	}
}

pub fn router(state: AppState) -> Router {
	let guarded = Router::new()
		.route("/", get(index))
		.route("/page", get(page))
		.layer(AntiparserLayer::new(state.antiparser.clone()));

	Router::new()
		.merge(guarded)
		.route("/open", get(open))
		.route("/login", post(login))
		.route("/stats", get(stats))
		.with_state(state)
}

async fn index() -> &'static str {
	"Banhammer demo. This page is protected from scraping.\n"
}

async fn page() -> &'static str {
	"Another protected page. Bans on / apply here too.\n"
}

async fn open() -> &'static str {
	"Not protected: requests here are neither counted nor blocked.\n"
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
	pub password: String,
}

/// Brute-force key: client address plus user agent
fn login_key(state: &AppState, conn: &ConnectionAddrs, headers: &HeaderMap) -> Option<String> {
	let options = state.antiparser.options();
	let forwarded = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok());
	let ip = resolve_connection_ip(conn, forwarded, &options);
	let user_agent = headers.get("user-agent").and_then(|v| v.to_str().ok()).unwrap_or_default();
	Some(format!("{} {}", ip, user_agent))
}

async fn login(
	State(state): State<AppState>,
	ConnectInfo(conn): ConnectInfo<ConnectionAddrs>,
	headers: HeaderMap,
	Json(req): Json<LoginRequest>,
) -> Response {
	let key = login_key(&state, &conn, &headers);

	if let Some(retry_after) = state.login_guard.ban_remaining(&key) {
		return BanRejection { status: StatusCode::TOO_MANY_REQUESTS, retry_after }.into_response();
	}

	if req.password == *state.login_password {
		// Forget the failed attempts of a legitimate user
		state.login_guard.unban(&key);
		info!("Successful login from {}", conn.peer);
		return Json(json!({ "status": "ok" })).into_response();
	}

	state.login_guard.register_bad_action(&key);
	let body = json!({
		"error": {
			"code": "E-AUTH-FAILED",
			"message": "Wrong password"
		}
	});
	(StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

async fn stats(State(state): State<AppState>) -> Json<serde_json::Value> {
	Json(json!({
		"antiparser": state.antiparser.accounter().stats(),
		"login": state.login_guard.stats(),
	}))
}


// vim: ts=4
