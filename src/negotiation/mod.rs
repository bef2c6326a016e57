//! Content negotiation subsystem.
//!
//! # Data Flow
//! ```text
//! Accept-Language header (raw string)
//!     → accept_language.rs (split, parse q-values, stable sort)
//!     → Vec<LanguageTag> (highest quality first)
//!     → languages() projection used for image fallback search
//! ```
//!
//! # Design Decisions
//! - Malformed entries degrade, they never raise errors
//! - Ties keep header order (stable sort)

pub mod accept_language;

pub use accept_language::{
    languages, parse_accept_language, preferred_language, primary_subtag, LanguageTag,
};
