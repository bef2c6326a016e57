//! Logical host resolution.
//!
//! Scans an ordered list of override headers (e.g. `X-Forwarded-Host`); the
//! first non-empty value wins. Without a match the request's own host is kept.

use axum::http::{HeaderMap, HeaderName};

use crate::routing::{handler_fn, middleware_fn, Middleware};

/// Middleware storing the resolved host in `RequestContext::host`.
pub fn real_host(host_headers: Vec<HeaderName>) -> Middleware {
    let host_headers = std::sync::Arc::new(host_headers);
    middleware_fn(move |next| {
        let host_headers = host_headers.clone();
        handler_fn(move |mut ctx, req| {
            if let Some(host) = resolve_host(&host_headers, req.headers()) {
                ctx.host = host;
            }
            next(ctx, req)
        })
    })
}

/// First non-empty value among `host_headers`, in order.
pub fn resolve_host(host_headers: &[HeaderName], headers: &HeaderMap) -> Option<String> {
    host_headers
        .iter()
        .filter_map(|name| headers.get(name))
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}
