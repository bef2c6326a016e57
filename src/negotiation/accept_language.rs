//! Accept-Language parsing.
//!
//! # Responsibilities
//! - Split the header into weighted language entries
//! - Parse `q=` weights, dropping entries outside `[0, 1]` or equal to zero
//! - Order entries by quality, keeping header order on ties

use std::cmp::Ordering;

/// A language code with its quality weight.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageTag {
    /// Language code as sent by the client (e.g. "en-US", "de").
    pub code: String,
    /// Quality weight in `(0, 1]`. Defaults to 1.0 when absent or unparseable.
    pub quality: f64,
}

/// Parse an Accept-Language header into tags sorted by quality (highest first).
///
/// Example: `"da, en-gb;q=0.8, en;q=0.7"` yields `da` (1.0), `en-gb` (0.8), `en` (0.7).
pub fn parse_accept_language(header: &str) -> Vec<LanguageTag> {
    let mut tags: Vec<LanguageTag> = header
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(parse_entry)
        .filter(|tag| !tag.code.is_empty() && tag.quality > 0.0)
        .collect();

    // sort_by is stable, equal weights keep their header order
    tags.sort_by(|a, b| b.quality.partial_cmp(&a.quality).unwrap_or(Ordering::Equal));
    tags
}

/// Parse one trimmed entry. `None` drops the entry.
fn parse_entry(entry: &str) -> Option<LanguageTag> {
    let Some((code, params)) = entry.split_once(';') else {
        return Some(LanguageTag {
            code: entry.to_string(),
            quality: 1.0,
        });
    };

    let quality = match params.trim().strip_prefix("q=") {
        Some(value) => match value.parse::<f64>() {
            Ok(q) if (0.0..=1.0).contains(&q) => q,
            // parsed but out of range (or NaN)
            Ok(_) => return None,
            Err(_) => 1.0,
        },
        None => 1.0,
    };

    Some(LanguageTag {
        code: code.trim().to_string(),
        quality,
    })
}

/// Language codes only, in preference order.
pub fn languages(header: &str) -> Vec<String> {
    parse_accept_language(header)
        .into_iter()
        .map(|tag| tag.code)
        .collect()
}

/// The most preferred language, if any entry survived parsing.
pub fn preferred_language(header: &str) -> Option<String> {
    parse_accept_language(header)
        .into_iter()
        .next()
        .map(|tag| tag.code)
}

/// Lower-cased primary subtag: `"de-DE"` becomes `"de"`.
pub fn primary_subtag(code: &str) -> String {
    code.split('-').next().unwrap_or_default().to_lowercase()
}
