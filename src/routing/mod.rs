//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request
//!     → context.rs (RequestContext from peer address and Host)
//!     → global middleware (IP, host, metrics)
//!     → group middleware (secret gate, access log)
//!     → panic recovery
//!     → handler
//!     → error.rs (centralized translation of handler errors)
//!
//! Route Compilation (at startup):
//!     RouterBuilder routes and groups
//!     → Fold middleware chains around each handler
//!     → Freeze as immutable axum::Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Exact path matching only
//! - Unmatched paths and methods go to the fallback handler

pub mod context;
pub mod error;
pub mod router;

pub use context::{request_host, RequestContext};
pub use error::{empty_response, translate_error, ErrorHandler, HandlerError};
pub use router::{compose, handler_fn, middleware_fn, Group, Handler, HandlerFuture, Middleware, RouterBuilder, Unmatched};
