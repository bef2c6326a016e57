//! Access logging.
//!
//! One INFO record per request, emitted after the response is produced. The
//! response itself is passed through untouched.

use axum::body::{Body, HttpBody};
use axum::http::{header, HeaderMap, Request};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::routing::{handler_fn, middleware_fn, request_host, Middleware};

/// Middleware logging `request completed` for every request.
pub fn access_log() -> Middleware {
    middleware_fn(|next| {
        handler_fn(move |ctx, req| {
            let next = next.clone();
            async move {
                let entry = AccessEntry::from_request(&req);
                let remote_addr = ctx.remote_addr();
                let remote_ip = ctx.client_ip.clone();
                let start = Instant::now();

                let result = next(ctx, req).await;

                let (status_code, response_body_length) = match &result {
                    Ok(response) => (
                        response.status().as_u16(),
                        response
                            .body()
                            .size_hint()
                            .exact()
                            .map(|len| len as i64)
                            .unwrap_or(-1),
                    ),
                    Err(err) => (err.status().as_u16(), 0),
                };

                tracing::info!(
                    method = %entry.method,
                    proto = %entry.proto,
                    host = %entry.host,
                    path = %entry.path,
                    query = %entry.query,
                    remote_addr = %remote_addr,
                    remote_ip = %remote_ip,
                    request_body_length = entry.request_body_length,
                    response_body_length,
                    status_code,
                    duration = ?start.elapsed(),
                    request_headers = %entry.headers,
                    "request completed"
                );

                result
            }
        })
    })
}

/// Request fields captured before the request is handed on.
struct AccessEntry {
    method: String,
    proto: String,
    host: String,
    path: String,
    query: String,
    request_body_length: i64,
    headers: String,
}

impl AccessEntry {
    fn from_request(req: &Request<Body>) -> Self {
        Self {
            method: req.method().to_string(),
            proto: format!("{:?}", req.version()),
            host: request_host(req),
            path: req.uri().path().to_string(),
            query: req.uri().query().unwrap_or_default().to_string(),
            request_body_length: request_body_length(req),
            headers: headers_json(req.headers()),
        }
    }
}

/// Declared body length, -1 when unknown.
fn request_body_length(req: &Request<Body>) -> i64 {
    req.headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .or_else(|| req.body().size_hint().exact().map(|len| len as i64))
        .unwrap_or(-1)
}

/// All headers as a JSON object keyed by lower-cased name; repeated headers are joined with `, `.
pub fn headers_json(headers: &HeaderMap) -> String {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        grouped
            .entry(name.as_str().to_lowercase())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    let joined: BTreeMap<String, String> = grouped
        .into_iter()
        .map(|(name, values)| (name, values.join(", ")))
        .collect();
    serde_json::to_string(&joined).unwrap_or_default()
}
