//! Client IP resolution.
//!
//! The configured override header (typically set by a reverse proxy) wins when
//! present and non-empty. Otherwise the port is stripped from the peer address.

use axum::http::{HeaderMap, HeaderName};
use std::net::SocketAddr;

use crate::routing::{handler_fn, middleware_fn, Middleware};

/// Middleware storing the resolved client IP in `RequestContext::client_ip`.
pub fn real_ip(ip_header: Option<HeaderName>) -> Middleware {
    middleware_fn(move |next| {
        let ip_header = ip_header.clone();
        handler_fn(move |mut ctx, req| {
            ctx.client_ip = resolve_client_ip(ip_header.as_ref(), req.headers(), &ctx.client_ip);
            next(ctx, req)
        })
    })
}

/// Client IP from the override header, else `peer` without its port.
pub fn resolve_client_ip(ip_header: Option<&HeaderName>, headers: &HeaderMap, peer: &str) -> String {
    let forwarded = ip_header
        .and_then(|name| headers.get(name))
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    match forwarded {
        Some(ip) => ip.to_string(),
        None => strip_port(peer),
    }
}

/// `ip:port` to `ip` (IPv6 without brackets); anything unparsable is returned as is.
fn strip_port(addr: &str) -> String {
    addr.parse::<SocketAddr>()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| addr.to_string())
}
