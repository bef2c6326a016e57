//! Endpoint handlers.
//!
//! # Endpoints
//! - image: safe or warning SVG chosen by the `DecisionEngine`
//! - health: empty 200
//! - version: `<name> <version>`
//! - not found: empty 200 for every unmatched path or method

use axum::body::Body;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::response::Response;
use std::sync::Arc;

use crate::detection::DecisionEngine;
use crate::http::middleware::access_log::headers_json;
use crate::observability::MetricsSet;
use crate::routing::{empty_response, handler_fn, Handler, HandlerError, RequestContext};

/// Name and version reported by the version endpoint.
pub fn version_string() -> String {
    format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Serves the detection image.
#[derive(Debug, Clone)]
pub struct ImageHandler {
    engine: Arc<DecisionEngine>,
    metrics: Arc<MetricsSet>,
}

impl ImageHandler {
    pub fn new(engine: Arc<DecisionEngine>, metrics: Arc<MetricsSet>) -> Self {
        Self { engine, metrics }
    }

    /// Decide, count, log warnings and build the image response.
    pub fn respond(&self, ctx: &RequestContext, req: &Request<Body>) -> Result<Response, HandlerError> {
        let referer = header_str(req, header::REFERER);
        let accept_language = header_str(req, header::ACCEPT_LANGUAGE);

        let decision = self.engine.decide(referer, accept_language);

        self.metrics
            .record_image_hit(&ctx.host, &decision.language, decision.reason.as_str());

        if decision.is_warning() {
            tracing::warn!(
                reason = %decision.reason,
                remote_ip = %ctx.client_ip,
                language = %decision.language,
                host = %ctx.host,
                headers = %headers_json(req.headers()),
                "phishing attempt detected"
            );
        } else {
            tracing::debug!(language = %decision.language, host = %ctx.host, "referrer allowed");
        }

        let response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_DISPOSITION, HeaderValue::from_static("inline; filename=\"image.svg\""))
            .header(header::CONTENT_TYPE, HeaderValue::from_static("image/svg+xml"))
            .header(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))
            .header(header::PRAGMA, HeaderValue::from_static("no-cache"))
            .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"))
            .body(Body::from(decision.body))?;
        Ok(response)
    }

    pub fn into_handler(self) -> Handler {
        let this = Arc::new(self);
        handler_fn(move |ctx, req| {
            let result = this.respond(&ctx, &req);
            async move { result }
        })
    }
}

/// Header value as text; absent or non-UTF-8 values read as empty.
fn header_str(req: &Request<Body>, name: header::HeaderName) -> &str {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

pub fn health() -> Handler {
    handler_fn(|_ctx, _req| async { Ok(empty_response(StatusCode::OK)) })
}

pub fn version() -> Handler {
    handler_fn(|_ctx, _req| async { Ok(Response::new(Body::from(version_string()))) })
}

/// Uniform answer for everything unrouted, no information about existing routes.
pub fn not_found() -> Handler {
    handler_fn(|_ctx, _req| async { Ok(empty_response(StatusCode::OK)) })
}
