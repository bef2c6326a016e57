//! Phishing detection subsystem.
//!
//! # Data Flow
//! ```text
//! Referer + Accept-Language
//!     → origin.rs (parse URL, match hostname against allowed origins)
//!     → engine.rs (outcome + reason, language selection)
//!     → images.rs (bytes for outcome class + language)
//!     → Decision
//! ```
//!
//! # Design Decisions
//! - Image set and origin set are built once at startup and never mutated
//! - Every class has an `en` image, so a decision always has a body

pub mod engine;
pub mod images;
pub mod origin;

pub use engine::{Decision, DecisionEngine, EngineConfig, Outcome, Reason};
pub use images::{ImageClass, ImageError, ImageSet};
pub use origin::{OriginMatcher, RefererCheck};
