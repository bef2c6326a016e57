//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the route table (image, health, version, fallback)
//! - Wire up middleware (IP/host resolution, metrics, recovery, secret gate, access log)
//! - Apply the request timeout
//! - Serve the main and metrics listeners with graceful shutdown

use axum::http::HeaderName;
use axum::routing::{get, MethodFilter};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;

use crate::config::DetectionConfig;
use crate::detection::{DecisionEngine, EngineConfig, ImageSet};
use crate::http::handlers::{self, ImageHandler};
use crate::http::middleware::{
    access_log, real_host, real_ip, recover, request_metrics, secret_key, SecretKeyConfig, SecretKeyError,
};
use crate::lifecycle::{serve_with_grace, Shutdown};
use crate::observability::MetricsSet;
use crate::routing::RouterBuilder;

/// Everything the server needs, resolved at startup.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub config: DetectionConfig,
    /// Bypass the secret gate.
    pub debug: bool,
    pub metrics: Arc<MetricsSet>,
    pub images: ImageSet,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    SecretKey(#[from] SecretKeyError),

    #[error("invalid header name {0:?}")]
    InvalidHeaderName(String),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP server for the detection endpoints.
#[derive(Debug)]
pub struct HttpServer {
    router: Router,
    grace: Duration,
}

impl HttpServer {
    /// Create a new HTTP server from resolved options.
    pub fn new(options: ServerOptions) -> Result<Self, ServerError> {
        let router = Self::build_router(&options)?;
        Ok(Self {
            router,
            grace: Duration::from_secs(options.config.server.graceful_timeout_secs),
        })
    }

    /// Build the route table with all middleware layers.
    #[allow(deprecated)]
    fn build_router(options: &ServerOptions) -> Result<Router, ServerError> {
        let config = &options.config;
        let server = &config.server;

        let ip_header = if server.ip_header.is_empty() {
            None
        } else {
            Some(header_name(&server.ip_header)?)
        };
        let host_headers = server
            .host_headers
            .iter()
            .map(|name| header_name(name))
            .collect::<Result<Vec<_>, _>>()?;

        let gate = secret_key(SecretKeyConfig {
            header_name: server.secret_key_header_name.clone(),
            header_value: server.secret_key_header_value.clone(),
            debug: options.debug,
        })?;

        let engine = DecisionEngine::new(
            EngineConfig {
                allowed_origins: config.allowed_origins.clone(),
                treat_missing_referer_as_phishing: config.treat_missing_referer_as_phishing,
            },
            options.images.clone(),
        );
        let image = ImageHandler::new(Arc::new(engine), options.metrics.clone());

        let (image_route, health_route, version_route) =
            (server.image_route(), server.health_route(), server.version_route());
        tracing::info!(route = %image_route, "image route");
        tracing::info!(route = %health_route, "health route");
        tracing::info!(route = %version_route, "version route");

        let mut builder = RouterBuilder::new(options.metrics.clone());
        builder
            .with(real_ip(ip_header))
            .with(real_host(host_headers))
            .with(request_metrics(options.metrics.clone()))
            .wrap_handlers(recover());

        // internal routes, not access-logged
        builder.group(|group| {
            group
                .with(gate)
                .route(MethodFilter::GET, health_route, handlers::health())
                .route(MethodFilter::GET, version_route, handlers::version());
        });

        builder.group(|group| {
            if config.logging.access_log {
                group.with(access_log());
            }
            group
                .route(MethodFilter::GET, image_route, image.into_handler())
                .fallback(handlers::not_found());
        });

        Ok(builder
            .build()
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeout_secs))))
    }

    /// The fully built router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` triggers and in-flight requests drain.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        serve_with_grace(listener, self.router, shutdown, self.grace).await?;

        tracing::info!(address = %addr, "HTTP server stopped");
        Ok(())
    }
}

/// Prometheus exposition on `GET /metrics`.
#[derive(Debug)]
pub struct MetricsServer {
    router: Router,
    grace: Duration,
}

impl MetricsServer {
    pub fn new(metrics: Arc<MetricsSet>, grace: Duration) -> Self {
        let router = Router::new().route(
            "/metrics",
            get(move || {
                let metrics = metrics.clone();
                async move { metrics.render() }
            }),
        );
        Self { router, grace }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Metrics server starting");

        serve_with_grace(listener, self.router, shutdown, self.grace).await?;

        tracing::info!(address = %addr, "Metrics server stopped");
        Ok(())
    }
}

fn header_name(name: &str) -> Result<HeaderName, ServerError> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|_| ServerError::InvalidHeaderName(name.to_string()))
}
