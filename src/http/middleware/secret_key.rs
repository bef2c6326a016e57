//! Secret header gate for internal endpoints.
//!
//! # Responsibilities
//! - Compare the configured header against the shared secret
//! - Answer 200 with an empty body on absence or mismatch (no oracle)
//! - Step aside entirely in debug mode
//!
//! The comparison hashes both sides before a constant-time equality check, so
//! neither content nor length of the secret leaks through timing.

use axum::http::{HeaderName, StatusCode};
use futures_util::FutureExt;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::routing::{empty_response, handler_fn, middleware_fn, Middleware};

/// Construction errors of the secret gate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecretKeyError {
    #[error("secret key gate requires a header name")]
    MissingHeaderName,

    #[error("secret key gate requires a header value")]
    MissingHeaderValue,

    #[error("invalid secret header name {0:?}")]
    InvalidHeaderName(String),
}

#[derive(Debug, Clone, Default)]
pub struct SecretKeyConfig {
    pub header_name: String,
    pub header_value: String,
    /// Let every request through.
    pub debug: bool,
}

/// Build the gate. Fails when the header name or the secret is empty.
pub fn secret_key(config: SecretKeyConfig) -> Result<Middleware, SecretKeyError> {
    if config.header_name.is_empty() {
        return Err(SecretKeyError::MissingHeaderName);
    }
    if config.header_value.is_empty() {
        return Err(SecretKeyError::MissingHeaderValue);
    }
    let header_name = HeaderName::from_bytes(config.header_name.as_bytes())
        .map_err(|_| SecretKeyError::InvalidHeaderName(config.header_name.clone()))?;

    let secret = std::sync::Arc::new(config.header_value);
    let debug = config.debug;

    Ok(middleware_fn(move |next| {
        let header_name = header_name.clone();
        let secret = secret.clone();
        handler_fn(move |ctx, req| {
            if debug {
                return next(ctx, req);
            }

            let provided = req
                .headers()
                .get(&header_name)
                .map(|value| value.as_bytes())
                .unwrap_or_default();

            if provided.is_empty() {
                tracing::error!(url = %req.uri(), remote_ip = %ctx.client_ip, "url called without secret header");
            } else if constant_time_eq(provided, secret.as_bytes()) {
                return next(ctx, req);
            } else {
                tracing::error!(
                    header = %String::from_utf8_lossy(provided),
                    remote_ip = %ctx.client_ip,
                    "url called with wrong secret header"
                );
            }
            async { Ok(empty_response(StatusCode::OK)) }.boxed()
        })
    }))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let ha = Sha256::digest(a);
    let hb = Sha256::digest(b);
    ha.ct_eq(&hb).into()
}
