//! Client IP resolution
//!
//! X-Forwarded-For is only consulted when the connection itself comes from a
//! trusted reverse proxy. Anything a client put into the header before it
//! reached our first proxy is ignored: the list is read right to left, our own
//! proxies are skipped and the first other address wins.
//!
//! Serve with `into_make_service_with_connect_info::<ConnectionAddrs>()` to
//! make the server's own address of the connection available; a plain
//! `ConnectInfo<SocketAddr>` works too, without it.

use std::borrow::Cow;
use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::extract::connect_info::Connected;
use axum::serve::IncomingStream;
use hyper::Request;
use tokio::net::TcpListener;

use crate::options::AntiparserOptions;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Both ends of an accepted connection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionAddrs {
	pub peer: SocketAddr,
	pub local: Option<SocketAddr>,
}

impl Connected<IncomingStream<'_, TcpListener>> for ConnectionAddrs {
	fn connect_info(stream: IncomingStream<'_, TcpListener>) -> Self {
		Self { peer: *stream.remote_addr(), local: stream.io().local_addr().ok() }
	}
}

impl Connected<SocketAddr> for ConnectionAddrs {
	fn connect_info(peer: SocketAddr) -> Self {
		Self { peer, local: None }
	}
}

/// Connection addresses of a request, from `ConnectInfo<ConnectionAddrs>` or
/// `ConnectInfo<SocketAddr>`
pub fn connection_addrs<B>(req: &Request<B>) -> Option<ConnectionAddrs> {
	let extensions = req.extensions();
	if let Some(ConnectInfo(addrs)) = extensions.get::<ConnectInfo<ConnectionAddrs>>() {
		return Some(*addrs);
	}
	extensions
		.get::<ConnectInfo<SocketAddr>>()
		.map(|ConnectInfo(peer)| ConnectionAddrs { peer: *peer, local: None })
}

/// Parse one X-Forwarded-For entry. Accepts a bare address or one with a
/// port (`192.0.2.1:8080`, `[2001:db8::1]:8080`).
fn parse_forwarded_entry(entry: &str) -> Option<IpAddr> {
	let entry = entry.trim();
	entry
		.parse::<IpAddr>()
		.ok()
		.or_else(|| entry.parse::<SocketAddr>().ok().map(|sa| sa.ip()))
}

/// Resolve the client address of a connection from `peer`.
///
/// Falls back to `peer` when it is not a trusted proxy, when there is no
/// forwarded list, when an entry is empty or invalid, or when every entry is
/// a trusted proxy.
pub fn resolve_client_ip(peer: IpAddr, forwarded_for: Option<&str>, trusted: &[IpAddr]) -> IpAddr {
	if !trusted.contains(&peer) {
		return peer;
	}
	let Some(list) = forwarded_for else {
		return peer;
	};

	for entry in list.trim_end_matches(',').split(',').rev() {
		match parse_forwarded_entry(entry) {
			Some(ip) if trusted.contains(&ip) => {}
			Some(ip) => return ip,
			None => return peer,
		}
	}
	peer
}

/// Proxies trusted for a connection: the configured ones, plus the local
/// address when `addLocalIpAddressToProxyList` is set
fn trusted_proxies<'a>(conn: &ConnectionAddrs, opts: &'a AntiparserOptions) -> Cow<'a, [IpAddr]> {
	let configured = opts.reverse_proxy_ips.as_slice();
	match conn.local.map(|addr| addr.ip()) {
		Some(local) if opts.add_local_ip_address_to_proxy_list && !configured.contains(&local) => {
			Cow::Owned(configured.iter().copied().chain([local]).collect())
		}
		_ => Cow::Borrowed(configured),
	}
}

/// Resolve the client address of a connection with the proxy settings of `opts`
pub fn resolve_connection_ip(
	conn: &ConnectionAddrs,
	forwarded_for: Option<&str>,
	opts: &AntiparserOptions,
) -> IpAddr {
	resolve_client_ip(conn.peer.ip(), forwarded_for, &trusted_proxies(conn, opts))
}

/// Extract the client address of a request.
///
/// Without connection info there is no address at all. Multiple
/// X-Forwarded-For headers are joined in order.
pub fn extract_client_ip<B>(req: &Request<B>, opts: &AntiparserOptions) -> Option<IpAddr> {
	let conn = connection_addrs(req)?;

	let forwarded: Vec<&str> = req
		.headers()
		.get_all(X_FORWARDED_FOR)
		.iter()
		.filter_map(|h| h.to_str().ok())
		.collect();
	if forwarded.is_empty() {
		return Some(conn.peer.ip());
	}

	Some(resolve_connection_ip(&conn, Some(&forwarded.join(",")), opts))
}


// vim: ts=4
