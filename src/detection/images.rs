//! Per-language image sets.
//!
//! Two classes of images are kept: the safe image returned for allowed
//! referers and the warning image returned for everything else. Each class
//! maps a lowercase primary language code to SVG bytes and must contain `en`.

use axum::body::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::ImagesConfig;
use crate::detection::engine::Outcome;

const OK_SVG: &[u8] = include_bytes!("../../assets/ok.svg");
const PHISHING_EN_SVG: &[u8] = include_bytes!("../../assets/phishing_en.svg");
const PHISHING_DE_SVG: &[u8] = include_bytes!("../../assets/phishing_de.svg");

/// Language every image class must provide.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Error type for image set construction.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("{class} image 'en' is required")]
    MissingDefault { class: ImageClass },

    #[error("{class} image for language {language} is empty")]
    Empty { class: ImageClass, language: String },

    #[error("failed to read {class} image for language {language} from {}: {source}", path.display())]
    Read {
        class: ImageClass,
        language: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Which of the two image maps an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageClass {
    Ok,
    Phishing,
}

impl fmt::Display for ImageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageClass::Ok => write!(f, "ok"),
            ImageClass::Phishing => write!(f, "phishing"),
        }
    }
}

impl From<Outcome> for ImageClass {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Safe => ImageClass::Ok,
            Outcome::Warning => ImageClass::Phishing,
        }
    }
}

/// Safe and warning images keyed by primary language.
#[derive(Debug, Clone)]
pub struct ImageSet {
    ok: HashMap<String, Bytes>,
    phishing: HashMap<String, Bytes>,
}

impl ImageSet {
    /// Build an image set. Keys are lower-cased; both maps need a non-empty `en`.
    pub fn new(
        ok: HashMap<String, Bytes>,
        phishing: HashMap<String, Bytes>,
    ) -> Result<Self, ImageError> {
        Ok(Self {
            ok: checked(ImageClass::Ok, ok)?,
            phishing: checked(ImageClass::Phishing, phishing)?,
        })
    }

    /// The images compiled into the binary (`en` and `de`).
    pub fn builtin() -> Self {
        let ok = HashMap::from([
            ("en".to_string(), Bytes::from_static(OK_SVG)),
            ("de".to_string(), Bytes::from_static(OK_SVG)),
        ]);
        let phishing = HashMap::from([
            ("en".to_string(), Bytes::from_static(PHISHING_EN_SVG)),
            ("de".to_string(), Bytes::from_static(PHISHING_DE_SVG)),
        ]);
        Self { ok, phishing }
    }

    /// Start from the built-in images and replace every class that has
    /// configured files. A configured class replaces the built-in map entirely.
    pub fn from_config(config: &ImagesConfig) -> Result<Self, ImageError> {
        let mut images = Self::builtin();

        if !config.ok.is_empty() {
            images.ok = checked(ImageClass::Ok, read_class(ImageClass::Ok, &config.ok)?)?;
        }
        if !config.phishing.is_empty() {
            images.phishing = checked(
                ImageClass::Phishing,
                read_class(ImageClass::Phishing, &config.phishing)?,
            )?;
        }

        tracing::debug!(
            ok_languages = ?images.languages(ImageClass::Ok),
            phishing_languages = ?images.languages(ImageClass::Phishing),
            "Images loaded"
        );
        Ok(images)
    }

    /// Image for a class and language.
    pub fn get(&self, class: ImageClass, language: &str) -> Option<&Bytes> {
        self.class(class).get(language)
    }

    /// Returns true if the class has an image for the language.
    pub fn contains(&self, class: ImageClass, language: &str) -> bool {
        self.class(class).contains_key(language)
    }

    /// The guaranteed `en` image of a class.
    pub fn default_image(&self, class: ImageClass) -> &Bytes {
        // present by construction
        &self.class(class)[DEFAULT_LANGUAGE]
    }

    /// Sorted language codes of a class.
    pub fn languages(&self, class: ImageClass) -> Vec<&str> {
        let mut langs: Vec<&str> = self.class(class).keys().map(String::as_str).collect();
        langs.sort_unstable();
        langs
    }

    fn class(&self, class: ImageClass) -> &HashMap<String, Bytes> {
        match class {
            ImageClass::Ok => &self.ok,
            ImageClass::Phishing => &self.phishing,
        }
    }
}

impl Default for ImageSet {
    fn default() -> Self {
        Self::builtin()
    }
}

fn checked(
    class: ImageClass,
    images: HashMap<String, Bytes>,
) -> Result<HashMap<String, Bytes>, ImageError> {
    let images: HashMap<String, Bytes> = images
        .into_iter()
        .map(|(language, bytes)| (language.to_lowercase(), bytes))
        .collect();

    if let Some((language, _)) = images.iter().find(|(_, bytes)| bytes.is_empty()) {
        return Err(ImageError::Empty {
            class,
            language: language.clone(),
        });
    }
    if !images.contains_key(DEFAULT_LANGUAGE) {
        return Err(ImageError::MissingDefault { class });
    }
    Ok(images)
}

fn read_class(
    class: ImageClass,
    paths: &std::collections::BTreeMap<String, PathBuf>,
) -> Result<HashMap<String, Bytes>, ImageError> {
    paths
        .iter()
        .map(|(language, path)| {
            std::fs::read(path)
                .map(|content| (language.clone(), Bytes::from(content)))
                .map_err(|source| ImageError::Read {
                    class,
                    language: language.clone(),
                    path: path.clone(),
                    source,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::io::Write;

    fn map(entries: &[(&str, &'static str)]) -> HashMap<String, Bytes> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), Bytes::from_static(v.as_bytes())))
            .collect()
    }

    #[test]
    fn test_builtin_images() {
        let images = ImageSet::builtin();
        assert_eq!(images.languages(ImageClass::Ok), vec!["de", "en"]);
        assert_eq!(images.languages(ImageClass::Phishing), vec!["de", "en"]);
        assert_ne!(
            images.get(ImageClass::Phishing, "en"),
            images.get(ImageClass::Phishing, "de")
        );
        assert!(!images.default_image(ImageClass::Ok).is_empty());
    }

    #[test]
    fn test_english_is_required() {
        let err = ImageSet::new(map(&[("de", "ok")]), map(&[("en", "warn")])).unwrap_err();
        assert!(matches!(err, ImageError::MissingDefault { class: ImageClass::Ok }));

        let err = ImageSet::new(map(&[("en", "ok")]), map(&[("de", "warn")])).unwrap_err();
        assert!(matches!(
            err,
            ImageError::MissingDefault { class: ImageClass::Phishing }
        ));
    }

    #[test]
    fn test_empty_image_rejected() {
        let err = ImageSet::new(map(&[("en", "")]), map(&[("en", "warn")])).unwrap_err();
        assert!(matches!(err, ImageError::Empty { .. }));
    }

    #[test]
    fn test_keys_are_lowercased() {
        let images = ImageSet::new(map(&[("EN", "ok")]), map(&[("en", "w"), ("De", "wd")])).unwrap();
        assert!(images.contains(ImageClass::Ok, "en"));
        assert!(images.contains(ImageClass::Phishing, "de"));
    }

    #[test]
    fn test_from_config_replaces_class() {
        let dir = tempfile::tempdir().unwrap();
        let en_path = dir.path().join("ok_en.svg");
        let fr_path = dir.path().join("ok_fr.svg");
        std::fs::File::create(&en_path).unwrap().write_all(b"<svg>en</svg>").unwrap();
        std::fs::File::create(&fr_path).unwrap().write_all(b"<svg>fr</svg>").unwrap();

        let config = ImagesConfig {
            ok: BTreeMap::from([("en".to_string(), en_path), ("fr".to_string(), fr_path)]),
            phishing: BTreeMap::new(),
        };
        let images = ImageSet::from_config(&config).unwrap();

        assert_eq!(images.languages(ImageClass::Ok), vec!["en", "fr"]);
        assert_eq!(
            images.get(ImageClass::Ok, "fr").map(|b| b.as_ref()),
            Some(&b"<svg>fr</svg>"[..])
        );
        // untouched class keeps the built-in images
        assert_eq!(images.languages(ImageClass::Phishing), vec!["de", "en"]);
    }

    #[test]
    fn test_from_config_read_error() {
        let config = ImagesConfig {
            ok: BTreeMap::new(),
            phishing: BTreeMap::from([(
                "en".to_string(),
                PathBuf::from("/nonexistent/phishing_en.svg"),
            )]),
        };
        let err = ImageSet::from_config(&config).unwrap_err();
        assert!(matches!(err, ImageError::Read { class: ImageClass::Phishing, .. }));
        assert!(err.to_string().contains("language en"));
    }
}
