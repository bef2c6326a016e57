//! Configuration loading from disk and environment.
//!
//! Sources are layered: built-in defaults, then the TOML file (if any), then
//! `ENTRA_` environment variables. A double underscore separates sections:
//! `ENTRA_SERVER__SECRET_KEY_HEADER_VALUE` sets `server.secret_key_header_value`.

use std::path::{Path, PathBuf};
use thiserror::Error;
use toml::{Table, Value};

use crate::config::schema::DetectionConfig;
use crate::config::validation::{normalize_config, validate_config, ValidationError};

/// Prefix of environment variables that override configuration values.
pub const ENV_PREFIX: &str = "ENTRA_";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to apply defaults: {0}")]
    Defaults(#[from] toml::ser::Error),

    #[error("environment variable {key}: {message}")]
    Env { key: String, message: String },

    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from an optional TOML file and the process environment.
pub fn load_config(path: Option<&Path>) -> Result<DetectionConfig, ConfigError> {
    let content = match path {
        Some(path) => Some(std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?),
        None => None,
    };
    load_config_from(content.as_deref(), std::env::vars())
}

/// Build the configuration from file content and environment pairs.
pub fn load_config_from<I>(content: Option<&str>, env: I) -> Result<DetectionConfig, ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut merged = match Value::try_from(DetectionConfig::default())? {
        Value::Table(table) => table,
        _ => Table::new(),
    };

    if let Some(content) = content {
        let file: Table = toml::from_str(content)?;
        merge(&mut merged, file);
    }

    let mut overrides: Vec<(String, String)> = env
        .into_iter()
        .filter(|(key, _)| key.starts_with(ENV_PREFIX))
        .collect();
    // deterministic when two variables map to the same key
    overrides.sort();
    for (key, value) in overrides {
        apply_env(&mut merged, &key, &value)?;
    }

    let config: DetectionConfig = Value::Table(merged).try_into()?;
    let config = normalize_config(config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Deep-merge `overlay` into `base`; tables merge, everything else replaces.
fn merge(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(existing)), Value::Table(incoming)) => merge(existing, incoming),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn apply_env(root: &mut Table, key: &str, raw: &str) -> Result<(), ConfigError> {
    let env_error = |message: String| ConfigError::Env {
        key: key.to_string(),
        message,
    };

    let path: Vec<String> = key[ENV_PREFIX.len()..]
        .to_lowercase()
        .split("__")
        .map(str::to_string)
        .collect();
    let Some((leaf, sections)) = path.split_last() else {
        return Ok(());
    };
    if leaf.is_empty() {
        return Err(env_error("empty key".to_string()));
    }

    let mut table = root;
    for section in sections {
        let entry = table
            .entry(section.clone())
            .or_insert(Value::Table(Table::new()));
        table = match entry {
            Value::Table(inner) => inner,
            _ => return Err(env_error(format!("{section} is not a section"))),
        };
    }

    // the existing value decides how the raw string is interpreted
    let value = match table.get(leaf) {
        Some(Value::Boolean(_)) => Value::Boolean(
            raw.parse()
                .map_err(|_| env_error(format!("{raw:?} is not a boolean")))?,
        ),
        Some(Value::Integer(_)) => Value::Integer(
            raw.parse()
                .map_err(|_| env_error(format!("{raw:?} is not an integer")))?,
        ),
        Some(Value::Array(_)) => Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| Value::String(item.to_string()))
                .collect(),
        ),
        Some(Value::Table(_)) => return Err(env_error(format!("{leaf} is a section"))),
        _ => Value::String(raw.to_string()),
    };
    table.insert(leaf.clone(), value);
    Ok(())
}
