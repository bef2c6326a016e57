//! Request middleware.
//!
//! Global chain, outer to inner: `real_ip` → `real_host` → `metrics`.
//! Group chains add `secret_key` (internal endpoints) and `access_log`
//! (image endpoint, when enabled). `recover` wraps each handler directly,
//! inside the group chain.

pub mod access_log;
pub mod metrics;
pub mod real_host;
pub mod real_ip;
pub mod recover;
pub mod secret_key;

pub use access_log::access_log;
pub use metrics::request_metrics;
pub use real_host::real_host;
pub use real_ip::real_ip;
pub use recover::recover;
pub use secret_key::{secret_key, SecretKeyConfig, SecretKeyError};
