//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → config file (TOML, optional)
//!     → ENTRA_* environment overrides
//!     → loader.rs (merge & deserialize)
//!     → validation.rs (normalize, semantic checks)
//!     → DetectionConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_config_from, ConfigError};
pub use schema::{
    DetectionConfig, ImagesConfig, LoggingConfig, RotateConfig, RotationPeriod, ServerConfig,
};
pub use validation::{validate_config, ValidationError};
