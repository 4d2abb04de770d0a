//! Contracts for the external engines the pipeline drives.
//!
//! The pipeline core never touches the screen, the recognizer, or the
//! translation backend directly. The embedding application supplies
//! implementations of these traits and the core orchestrates them: scheduling
//! captures, routing text through packages, and publishing results.

use image::DynamicImage;
use lazy_static::lazy_static;
use std::collections::HashMap;

use crate::types::{LanguagePackage, Region};

/// Captures pixels for a screen region
#[async_trait::async_trait]
pub trait CaptureSource: Send + Sync {
    /// Capture the current contents of `region`
    async fn capture(&self, region: &Region) -> Result<DynamicImage, CaptureError>;
}

/// Recognizes text in a captured frame.
///
/// Engines report internal failure as an empty string rather than an error;
/// the pipeline treats an empty recognition as "nothing to show" either way.
#[async_trait::async_trait]
pub trait OcrEngine: Send + Sync {
    /// Extract text from `frame`. `language_bias` is an IANA tag hinting the
    /// recognizer at the expected language, when one is known.
    async fn recognize(&self, frame: &DynamicImage, language_bias: Option<&str>) -> String;
}

/// Translates text between two directly packaged languages
#[async_trait::async_trait]
pub trait TranslationEngine: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        from_code: &str,
        to_code: &str,
    ) -> Result<String, TranslationError>;
}

/// Manages the offline language package inventory
#[async_trait::async_trait]
pub trait PackageStore: Send + Sync {
    /// Packages installed and usable right now
    async fn list_installed(&self) -> Vec<LanguagePackage>;

    /// Packages that could be downloaded and installed
    async fn list_available(&self) -> Vec<LanguagePackage>;

    /// Install one package. Returns whether the package is present afterwards.
    async fn install(&self, from_code: &str, to_code: &str) -> bool;
}

/// Errors that can occur while capturing a frame
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Capture region out of display bounds")]
    InvalidRegion,

    #[error("Display unavailable")]
    DisplayUnavailable,

    #[error("Capture failed: {0}")]
    Failed(String),
}

/// Errors that can occur during a translation call
#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    #[error("Translation engine failure: {0}")]
    EngineFailure(String),

    #[error("No installed package translates {from} to {to}")]
    UnsupportedPair { from: String, to: String },
}

lazy_static! {
    /// ISO 639-1 code to the IANA tag handed to the recognizer as a language bias
    static ref OCR_LANGUAGE_TAGS: HashMap<&'static str, &'static str> = {
        let mut tags = HashMap::new();
        tags.insert("en", "en-US");
        tags.insert("es", "es-ES");
        tags.insert("fr", "fr-FR");
        tags.insert("de", "de-DE");
        tags.insert("it", "it-IT");
        tags.insert("pt", "pt-PT");
        tags.insert("ru", "ru-RU");
        tags.insert("ja", "ja-JP");
        tags.insert("ko", "ko-KR");
        tags.insert("zh", "zh-Hans");
        tags.insert("ar", "ar-SA");
        tags.insert("hi", "hi-IN");
        tags.insert("nl", "nl-NL");
        tags.insert("sv", "sv-SE");
        tags.insert("da", "da-DK");
        tags.insert("no", "no-NO");
        tags.insert("fi", "fi-FI");
        tags.insert("pl", "pl-PL");
        tags.insert("cs", "cs-CZ");
        tags.insert("sk", "sk-SK");
        tags
    };
}

/// Look up the recognizer bias tag for an ISO 639-1 code.
///
/// Unknown codes return `None` and the recognizer falls back to its own
/// default bias.
pub fn ocr_language_tag(code: &str) -> Option<&'static str> {
    OCR_LANGUAGE_TAGS.get(code).copied()
}

/// Normalize raw recognizer output into a single subtitle line.
///
/// Splits the text into lines, trims each, drops the empty ones, collapses
/// runs of internal whitespace, and joins the survivors with single spaces.
pub fn clean_recognized_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join(" ")
}
