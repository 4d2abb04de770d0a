//! Core types used throughout the subtitle pipeline.
//!
//! This module defines the fundamental data structures for region capture,
//! translation routing, and subtitle results, plus the monotonic clock that
//! stamps every produced result.

use serde::{Deserialize, Serialize};

/// A rectangular screen region selected for capture, in screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// Create a region, rejecting degenerate sizes
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Result<Self, PipelineError> {
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidRegion { width, height });
        }
        Ok(Self { x, y, width, height })
    }

    /// Get the center point of the region
    pub fn center(&self) -> (i32, i32) {
        (
            self.x + (self.width as i32 / 2),
            self.y + (self.height as i32 / 2),
        )
    }
}

/// User-facing translation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationSettings {
    /// Whether recognized text gets translated
    #[serde(default)]
    pub enabled: bool,

    /// ISO 639-1 code of the language read off the screen
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// ISO 639-1 code of the language to translate into
    #[serde(default = "default_target_language")]
    pub target_language: String,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            source_language: default_source_language(),
            target_language: default_target_language(),
        }
    }
}

impl TranslationSettings {
    /// Whether source and target are the same language
    pub fn is_identity(&self) -> bool {
        self.source_language == self.target_language
    }
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_target_language() -> String {
    "es".to_string()
}

/// A directed translation package: translates text from one language into another
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LanguagePackage {
    pub from_code: String,
    pub to_code: String,
}

impl LanguagePackage {
    pub fn new(from_code: &str, to_code: &str) -> Self {
        Self {
            from_code: from_code.to_string(),
            to_code: to_code.to_string(),
        }
    }
}

/// An ordered chain of language codes describing a translation route.
///
/// A single node is the identity route (no translation needed), two nodes are
/// a direct package, and longer chains pass through intermediate languages.
/// An empty path means no route exists.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TranslationPath(Vec<String>);

impl TranslationPath {
    pub fn new(codes: Vec<String>) -> Self {
        Self(codes)
    }

    /// The unroutable path
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// The no-op route for a single language
    pub fn identity(code: &str) -> Self {
        Self(vec![code.to_string()])
    }

    /// Whether any route exists (identity included)
    pub fn is_routable(&self) -> bool {
        !self.0.is_empty()
    }

    /// Whether this is the no-op route
    pub fn is_identity(&self) -> bool {
        self.0.len() == 1
    }

    /// Number of translation steps along the route
    pub fn hops(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    /// The language codes along the route, in traversal order
    pub fn nodes(&self) -> &[String] {
        &self.0
    }

    /// Consecutive (from, to) pairs along the route
    pub fn pairs(&self) -> Vec<LanguagePackage> {
        self.0
            .windows(2)
            .map(|pair| LanguagePackage::new(&pair[0], &pair[1]))
            .collect()
    }
}

/// A single processed frame of subtitle output
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleResult {
    /// Text as recognized from the captured frame, after cleanup
    pub original_text: String,
    /// Translated text, or a copy of the original when translation is off
    pub translated_text: String,
    /// Whether translation was applied
    pub is_translated: bool,
    /// Language the text was recognized in
    pub source_language: String,
    /// Language the text was translated into
    pub target_language: String,
    /// Recognition confidence (0.0-1.0)
    pub confidence: f64,
    /// Creation stamp in epoch seconds, strictly increasing per controller
    pub created_at: f64,
}

/// Severity of a status message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSeverity {
    Info,
    Warning,
    Error,
}

impl StatusSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusSeverity::Info => "info",
            StatusSeverity::Warning => "warning",
            StatusSeverity::Error => "error",
        }
    }
}

/// A status message with its severity, as surfaced to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub message: String,
    pub severity: StatusSeverity,
}

impl StatusUpdate {
    pub fn new(message: &str, severity: StatusSeverity) -> Self {
        Self {
            message: message.to_string(),
            severity,
        }
    }
}

/// Snapshot of the capture controller's externally visible state
#[derive(Debug, Clone)]
pub struct ControllerState {
    /// Selected capture region, if any
    pub region: Option<Region>,
    /// Current translation settings
    pub settings: TranslationSettings,
    /// Most recently produced result
    pub last_result: Option<SubtitleResult>,
    /// Whether the capture loop is running
    pub running: bool,
    /// Current status line
    pub status: StatusUpdate,
}

/// Current wall-clock time in epoch seconds
pub(crate) fn wall_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

const CLOCK_EPSILON: f64 = 1e-6;

/// Wall-clock stamp source with strict per-instance monotonicity.
///
/// Consecutive calls can land on the same wall-clock microsecond; the clock
/// bumps such stamps by a small epsilon so consumers can order results by
/// timestamp alone.
#[derive(Debug, Default)]
pub struct ResultClock {
    last: f64,
}

impl ResultClock {
    pub fn new() -> Self {
        Self { last: 0.0 }
    }

    /// Next stamp, strictly greater than every previous one from this clock
    pub fn now(&mut self) -> f64 {
        let wall = wall_seconds();
        let stamp = if wall > self.last {
            wall
        } else {
            self.last + CLOCK_EPSILON
        };
        self.last = stamp;
        stamp
    }
}

/// Errors surfaced to the embedding application at setup time
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid region size: {width}x{height}")]
    InvalidRegion { width: u32, height: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
