//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the detector.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration for the phishing detection service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Listener, paths and header settings.
    pub server: ServerConfig,

    /// Log output settings.
    pub logging: LoggingConfig,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Custom image files keyed by primary language.
    pub images: ImagesConfig,

    /// Hostnames of the legitimate login pages.
    pub allowed_origins: Vec<String>,

    /// Serve the warning image when no Referer is sent.
    pub treat_missing_referer_as_phishing: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            timeout_secs: 5,
            images: ImagesConfig::default(),
            allowed_origins: vec![
                "login.microsoftonline.com".to_string(),
                "login.microsoft.com".to_string(),
                "autologon.microsoftazuread-sso.com".to_string(),
                "device.login.microsoftonline.com".to_string(),
            ],
            treat_missing_referer_as_phishing: true,
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8000").
    pub listen: String,

    /// Metrics listener bind address. Empty disables the listener.
    pub listen_metrics: String,

    /// Time in seconds in-flight requests get to finish on shutdown.
    pub graceful_timeout_secs: u64,

    /// Header carrying the secret for the health and version routes.
    pub secret_key_header_name: String,

    /// Expected secret value. Required.
    pub secret_key_header_value: String,

    /// Header holding the client IP when running behind a proxy.
    pub ip_header: String,

    /// Headers holding the original host, checked in order.
    pub host_headers: Vec<String>,

    /// Path of the image route, without leading slash. Empty = "image".
    pub path_image: String,

    /// Path of the health route. Empty = "health".
    pub path_health: String,

    /// Path of the version route. Empty = "version".
    pub path_version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8000".to_string(),
            listen_metrics: String::new(),
            graceful_timeout_secs: 10,
            secret_key_header_name: "X-Secret-Key-Header".to_string(),
            secret_key_header_value: String::new(),
            ip_header: String::new(),
            host_headers: Vec::new(),
            path_image: String::new(),
            path_health: String::new(),
            path_version: String::new(),
        }
    }
}

impl ServerConfig {
    pub fn image_route(&self) -> String {
        route(&self.path_image, "image")
    }

    pub fn health_route(&self) -> String {
        route(&self.path_health, "health")
    }

    pub fn version_route(&self) -> String {
        route(&self.path_version, "version")
    }
}

fn route(configured: &str, default: &str) -> String {
    let path = configured.trim_start_matches('/');
    if path.is_empty() {
        format!("/{default}")
    } else {
        format!("/{path}")
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log every request on the image route and the fallback.
    pub access_log: bool,

    /// Emit JSON lines instead of human readable output.
    pub json: bool,

    /// Log file path. Empty logs to stdout.
    pub log_file: String,

    /// Log file rotation.
    pub rotate: RotateConfig,
}

/// Log rotation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RotateConfig {
    pub enabled: bool,

    /// How often a new file is started.
    pub period: RotationPeriod,

    /// Rotated files to keep. 0 keeps all.
    pub max_files: usize,
}

impl Default for RotateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            period: RotationPeriod::Daily,
            max_files: 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationPeriod {
    Minutely,
    Hourly,
    Daily,
    Never,
}

/// Custom image files. A non-empty map replaces the built-in images of that class.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ImagesConfig {
    /// Images for allowed referers.
    pub ok: BTreeMap<String, PathBuf>,

    /// Images for suspicious referers.
    pub phishing: BTreeMap<String, PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_default_and_custom() {
        let mut server = ServerConfig::default();
        assert_eq!(server.image_route(), "/image");
        assert_eq!(server.health_route(), "/health");
        assert_eq!(server.version_route(), "/version");

        server.path_image = "/pixel.svg".to_string();
        server.path_health = "status".to_string();
        assert_eq!(server.image_route(), "/pixel.svg");
        assert_eq!(server.health_route(), "/status");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: DetectionConfig = toml::from_str(
            r#"
            allowed_origins = ["loginsite.internal"]

            [server]
            secret_key_header_value = "SECRET"

            [logging.rotate]
            period = "hourly"
            "#,
        )
        .unwrap();

        assert_eq!(config.allowed_origins, vec!["loginsite.internal"]);
        assert_eq!(config.server.listen, "127.0.0.1:8000");
        assert_eq!(config.server.secret_key_header_name, "X-Secret-Key-Header");
        assert_eq!(config.logging.rotate.period, RotationPeriod::Hourly);
        assert!(config.treat_missing_referer_as_phishing);
        assert_eq!(config.timeout_secs, 5);
    }
}
