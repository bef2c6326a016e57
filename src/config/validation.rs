//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses are host:port)
//! - Check required secrets and image maps
//! - Normalize paths and image keys
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DetectionConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::DetectionConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: {value:?} is not a valid host:port address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("{field}: {value:?} is not a valid header name")]
    InvalidHeaderName { field: &'static str, value: String },

    #[error("allowed_origins: {0:?} is not a plain hostname")]
    InvalidOrigin(String),

    #[error("{class} image name {language:?} contains a dash, please only use the primary language")]
    ImageLanguageWithRegion { class: &'static str, language: String },

    #[error("{class} image 'en' is required, please add it to the images map")]
    MissingDefaultImage { class: &'static str },

    #[error("route {0:?} is configured more than once")]
    DuplicateRoute(String),
}

/// Strip leading slashes from route paths and lower-case image keys.
pub fn normalize_config(mut config: DetectionConfig) -> DetectionConfig {
    for path in [
        &mut config.server.path_image,
        &mut config.server.path_health,
        &mut config.server.path_version,
    ] {
        *path = path.trim_start_matches('/').to_string();
    }

    config.images.ok = std::mem::take(&mut config.images.ok)
        .into_iter()
        .map(|(k, v)| (k.to_lowercase(), v))
        .collect();
    config.images.phishing = std::mem::take(&mut config.images.phishing)
        .into_iter()
        .map(|(k, v)| (k.to_lowercase(), v))
        .collect();

    config
}

/// Check a configuration, collecting every error.
pub fn validate_config(config: &DetectionConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let server = &config.server;

    check_address("server.listen", &server.listen, &mut errors);
    if !server.listen_metrics.is_empty() {
        check_address("server.listen_metrics", &server.listen_metrics, &mut errors);
    }

    if config.timeout_secs == 0 {
        errors.push(ValidationError::ZeroDuration { field: "timeout_secs" });
    }
    if server.graceful_timeout_secs == 0 {
        errors.push(ValidationError::ZeroDuration {
            field: "server.graceful_timeout_secs",
        });
    }

    if server.secret_key_header_name.is_empty() {
        errors.push(ValidationError::Required {
            field: "server.secret_key_header_name",
        });
    } else {
        check_header_name("server.secret_key_header_name", &server.secret_key_header_name, &mut errors);
    }
    if server.secret_key_header_value.is_empty() {
        errors.push(ValidationError::Required {
            field: "server.secret_key_header_value",
        });
    }
    if !server.ip_header.is_empty() {
        check_header_name("server.ip_header", &server.ip_header, &mut errors);
    }
    for header in &server.host_headers {
        check_header_name("server.host_headers", header, &mut errors);
    }

    let routes = [server.image_route(), server.health_route(), server.version_route()];
    for (i, route) in routes.iter().enumerate() {
        if routes[..i].contains(route) {
            errors.push(ValidationError::DuplicateRoute(route.clone()));
        }
    }

    if config.allowed_origins.is_empty() {
        errors.push(ValidationError::Required { field: "allowed_origins" });
    }
    for origin in &config.allowed_origins {
        if !is_plain_hostname(origin) {
            errors.push(ValidationError::InvalidOrigin(origin.clone()));
        }
    }

    for (class, images) in [("ok", &config.images.ok), ("phishing", &config.images.phishing)] {
        if images.is_empty() {
            continue;
        }
        for language in images.keys().filter(|k| k.contains('-')) {
            errors.push(ValidationError::ImageLanguageWithRegion {
                class,
                language: language.clone(),
            });
        }
        if !images.keys().any(|k| k.eq_ignore_ascii_case("en")) {
            errors.push(ValidationError::MissingDefaultImage { class });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    let valid = value
        .rsplit_once(':')
        .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
        .unwrap_or(false);
    if !valid {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_header_name(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if axum::http::HeaderName::from_bytes(value.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidHeaderName {
            field,
            value: value.to_string(),
        });
    }
}

/// Hostname without scheme, port, path or wildcard.
fn is_plain_hostname(origin: &str) -> bool {
    !origin.is_empty()
        && origin.len() <= 253
        && origin.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}
