//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum serve, timeout, graceful shutdown)
//!     → routing (middleware chain, route lookup)
//!     → handlers.rs (image decision, health, version, not found)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod server;

pub use server::{HttpServer, MetricsServer, ServerError, ServerOptions};
