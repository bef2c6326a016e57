//! Request metrics.

use std::sync::Arc;
use std::time::Instant;

use crate::observability::MetricsSet;
use crate::routing::{handler_fn, middleware_fn, Middleware, Unmatched};

/// Path label shared by every request served by the fallback handler.
pub const UNMATCHED_PATH: &str = "unmatched";

/// Middleware recording `http_requests_total` and `http_request_duration_seconds`.
///
/// Labels use the resolved host, so it must run after the host resolver.
/// Unrouted requests are recorded under [`UNMATCHED_PATH`].
pub fn request_metrics(metrics: Arc<MetricsSet>) -> Middleware {
    middleware_fn(move |next| {
        let metrics = metrics.clone();
        handler_fn(move |ctx, req| {
            let next = next.clone();
            let metrics = metrics.clone();
            async move {
                let method = req.method().to_string();
                let path = if req.extensions().get::<Unmatched>().is_some() {
                    UNMATCHED_PATH.to_string()
                } else {
                    req.uri().path().to_string()
                };
                let host = ctx.host.clone();
                let start = Instant::now();

                let result = next(ctx, req).await;

                let code = match &result {
                    Ok(response) => response.status(),
                    Err(err) => err.status(),
                };
                metrics.record_request(code.as_u16(), &method, &host, &path, start.elapsed());
                result
            }
        })
    })
}
