//! Phishing/safe decision engine.
//!
//! # Responsibilities
//! - Classify the Referer (missing, invalid, allowed, not allow-listed)
//! - Pick the outcome class and the response language
//! - Resolve the image bytes to return
//!
//! # Design Decisions
//! - Pure: same referer, language header and configuration always produce
//!   the same `Decision`; metrics and logs are emitted by the caller
//! - Malformed input never errors, it degrades to a warning or to `en`
//! - Only the missing-referer branch honors `treat_missing_referer_as_phishing`

use axum::body::Bytes;
use std::fmt;

use crate::detection::images::{ImageClass, ImageSet, DEFAULT_LANGUAGE};
use crate::detection::origin::{OriginMatcher, RefererCheck};
use crate::negotiation::{languages, primary_subtag};

/// Which image class a request receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Safe,
    Warning,
}

/// Why the engine chose an outcome. Also used as the `status` metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    MissingReferer,
    InvalidReferer,
    RefererNotAllowListed,
    RefererAllowed,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::MissingReferer => "missing referrer",
            Reason::InvalidReferer => "invalid referrer",
            Reason::RefererNotAllowListed => "referrer not allow-listed",
            Reason::RefererAllowed => "referrer allowed",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of evaluating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub outcome: Outcome,
    pub reason: Reason,
    pub language: String,
    pub body: Bytes,
}

impl Decision {
    pub fn is_warning(&self) -> bool {
        self.outcome == Outcome::Warning
    }
}

/// Inputs fixed at startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub allowed_origins: Vec<String>,
    pub treat_missing_referer_as_phishing: bool,
}

/// Decides between the safe and the warning image.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    origins: OriginMatcher,
    images: ImageSet,
    treat_missing_referer_as_phishing: bool,
}

impl DecisionEngine {
    pub fn new(config: EngineConfig, images: ImageSet) -> Self {
        Self {
            origins: OriginMatcher::new(&config.allowed_origins),
            images,
            treat_missing_referer_as_phishing: config.treat_missing_referer_as_phishing,
        }
    }

    /// Evaluate a request given its raw Referer and Accept-Language values.
    pub fn decide(&self, referer: &str, accept_language: &str) -> Decision {
        let (outcome, reason) = match self.origins.check(referer) {
            RefererCheck::Missing if self.treat_missing_referer_as_phishing => {
                (Outcome::Warning, Reason::MissingReferer)
            }
            RefererCheck::Missing => (Outcome::Safe, Reason::MissingReferer),
            RefererCheck::Invalid => (Outcome::Warning, Reason::InvalidReferer),
            RefererCheck::Allowed => (Outcome::Safe, Reason::RefererAllowed),
            RefererCheck::NotAllowed => (Outcome::Warning, Reason::RefererNotAllowListed),
        };

        let class = ImageClass::from(outcome);
        let language = self.select_language(class, accept_language);
        let body = self
            .images
            .get(class, &language)
            .unwrap_or_else(|| self.images.default_image(class))
            .clone();

        Decision {
            outcome,
            reason,
            language,
            body,
        }
    }

    /// First preferred primary language the class has an image for, else `en`.
    pub fn select_language(&self, class: ImageClass, accept_language: &str) -> String {
        languages(accept_language)
            .iter()
            .map(|code| primary_subtag(code))
            .find(|lang| self.images.contains(class, lang))
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
    }

    pub fn images(&self) -> &ImageSet {
        &self.images
    }
}
