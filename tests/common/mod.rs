//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use entra_phishing_detection::config::DetectionConfig;
use entra_phishing_detection::detection::ImageSet;
use entra_phishing_detection::http::{HttpServer, MetricsServer, ServerError, ServerOptions};
use entra_phishing_detection::lifecycle::Shutdown;
use entra_phishing_detection::observability::MetricsSet;

pub const SECRET_HEADER: &str = "X-Secret-Key-Header";
pub const SECRET: &str = "integration-secret";

/// Default configuration with a secret and a short grace period.
pub fn test_config() -> DetectionConfig {
    let mut config = DetectionConfig::default();
    config.server.secret_key_header_value = SECRET.to_string();
    config.server.graceful_timeout_secs = 1;
    config
}

/// A detector running on an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub metrics_addr: SocketAddr,
    pub metrics: Arc<MetricsSet>,
    shutdown: Arc<Shutdown>,
    handles: Vec<JoinHandle<Result<(), ServerError>>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn metrics_url(&self) -> String {
        format!("http://{}/metrics", self.metrics_addr)
    }

    /// Trigger shutdown and wait for both listeners to stop.
    pub async fn stop(self) {
        self.shutdown.trigger();
        for handle in self.handles {
            let result = tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .expect("server did not stop in time")
                .expect("server task panicked");
            assert!(result.is_ok());
        }
    }
}

/// Start the detector and its metrics listener.
pub async fn spawn_server(config: DetectionConfig, debug: bool) -> TestServer {
    let metrics = Arc::new(MetricsSet::new().unwrap());
    let grace = Duration::from_secs(config.server.graceful_timeout_secs);
    let server = HttpServer::new(ServerOptions {
        config,
        debug,
        metrics: metrics.clone(),
        images: ImageSet::builtin(),
    })
    .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let metrics_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let metrics_addr = metrics_listener.local_addr().unwrap();

    let shutdown = Arc::new(Shutdown::new());
    let mut handles = Vec::new();

    let s = shutdown.clone();
    handles.push(tokio::spawn(async move { server.run(listener, &s).await }));

    let s = shutdown.clone();
    let metrics_server = MetricsServer::new(metrics.clone(), grace);
    handles.push(tokio::spawn(async move { metrics_server.run(metrics_listener, &s).await }));

    TestServer {
        addr,
        metrics_addr,
        metrics,
        shutdown,
        handles,
    }
}
