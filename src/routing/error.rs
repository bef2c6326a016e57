//! Handler errors and their translation to responses.
//!
//! # Design Decisions
//! - Error responses never carry a body; status is the only signal
//! - Only an explicit HTTP fault chooses its own status, everything else is 500

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::Response;
use std::sync::Arc;
use thiserror::Error;

use crate::routing::context::RequestContext;

/// Error returned by handlers and middleware.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A fault with a status code chosen by the raising component.
    #[error("http error {status}: {message}")]
    Http { status: StatusCode, message: String },

    #[error("failed to build response: {0}")]
    Response(#[from] axum::http::Error),

    #[error("{0}")]
    Internal(String),
}

impl HandlerError {
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        HandlerError::Http {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        HandlerError::Internal(message.into())
    }

    /// Status code the error translates to.
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::Http { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Centralized translation of handler errors into responses.
pub type ErrorHandler = Arc<dyn Fn(&RequestContext, &HandlerError) -> Response + Send + Sync>;

/// Default error handler: log and answer with the error's status and no body.
pub fn translate_error(ctx: &RequestContext, err: &HandlerError) -> Response {
    tracing::error!(
        error = %err,
        host = %ctx.host,
        remote_ip = %ctx.client_ip,
        "error on request"
    );
    empty_response(err.status())
}

/// Response with a status and an empty body.
pub fn empty_response(status: StatusCode) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}
