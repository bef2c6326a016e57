//! Phishing detection image endpoint for Entra ID (Azure AD) login pages.

pub mod config;
pub mod detection;
pub mod http;
pub mod lifecycle;
pub mod negotiation;
pub mod observability;
pub mod routing;

pub use config::schema::DetectionConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
