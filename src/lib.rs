//! Subtitle Pipeline - Screen capture translation orchestrator
//!
//! This crate turns a selected screen region into live, optionally translated
//! subtitles. It coordinates four pluggable engines:
//!
//! - **Capture**: Grabs frames from the selected screen region
//! - **OCR**: Recognizes text in each captured frame
//! - **Translation**: Translates text between directly packaged language pairs
//! - **Package store**: Manages the offline language package inventory
//!
//! # Architecture
//!
//! The capture controller polls the capture source on a fixed cadence,
//! recognizes and deduplicates text, and routes it through the translation
//! router, which chains installed language packages (direct, via the pivot
//! language, or by bounded graph search). Results fan out through the event
//! bus to in-process subscribers and through the subtitle channel to detached
//! display surfaces that poll for the latest snapshot.

pub mod bus;
pub mod channel;
pub mod config;
pub mod controller;
pub mod engines;
pub mod router;
pub mod types;

// Re-export commonly used types
pub use bus::{EventBus, EventKind, PipelineEvent, SubscriberId};
pub use channel::{
    LivenessFlag, RegionSnapshot, SubtitleChannel, SubtitleSnapshot, SNAPSHOT_SCHEMA_VERSION,
};
pub use config::{Config, GeneralConfig, TimingConfig, TranslationConfig};
pub use controller::CaptureController;
pub use engines::{
    clean_recognized_text, ocr_language_tag, CaptureError, CaptureSource, OcrEngine, PackageStore,
    TranslationEngine, TranslationError,
};
pub use router::{
    InstallReport, Inventory, TranslationReadiness, TranslationRouter, MAX_PATH_NODES,
};
pub use types::{
    ControllerState, LanguagePackage, PipelineError, Region, ResultClock, StatusSeverity,
    StatusUpdate, SubtitleResult, TranslationPath, TranslationSettings,
};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize global tracing subscriber for application-wide logging.
///
/// Respects the RUST_LOG environment variable and falls back to the provided
/// default filter. Safe to call more than once; later calls are no-ops.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .try_init();
}
