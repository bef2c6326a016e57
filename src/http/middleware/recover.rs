//! Panic recovery.

use axum::http::StatusCode;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;

use crate::routing::{empty_response, handler_fn, middleware_fn, Middleware};

/// Middleware turning a panic below it into a 500 with an empty body.
pub fn recover() -> Middleware {
    middleware_fn(|next| {
        handler_fn(move |ctx, req| {
            let next = next.clone();
            async move {
                let host = ctx.host.clone();
                let remote_ip = ctx.client_ip.clone();

                match AssertUnwindSafe(async move { next(ctx, req).await })
                    .catch_unwind()
                    .await
                {
                    Ok(result) => result,
                    Err(panic) => {
                        tracing::error!(
                            panic = %panic_message(panic.as_ref()),
                            host = %host,
                            remote_ip = %remote_ip,
                            "recovered from panic"
                        );
                        Ok(empty_response(StatusCode::INTERNAL_SERVER_ERROR))
                    }
                }
            }
        })
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
