//! Capture orchestration.
//!
//! `CaptureController` owns the selected region, the live translation
//! settings, and the background capture loop. The loop polls the capture
//! source on a fixed cadence, runs recognition and translation on each frame,
//! drops consecutive duplicates, and publishes fresh results to the event bus
//! and the subtitle channel. Controller handles are cheap clones sharing one
//! state block, so UI surfaces and the loop itself observe the same state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::bus::{EventBus, PipelineEvent};
use crate::channel::SubtitleChannel;
use crate::config::Config;
use crate::engines::{
    clean_recognized_text, ocr_language_tag, CaptureError, CaptureSource, OcrEngine,
};
use crate::router::{InstallReport, TranslationReadiness, TranslationRouter};
use crate::types::{
    ControllerState, Region, ResultClock, StatusSeverity, StatusUpdate, SubtitleResult,
    TranslationSettings,
};

/// Confidence reported for recognized text. The recognizer gives no usable
/// per-line score, so results carry a fixed value.
const OCR_CONFIDENCE: f64 = 1.0;

struct LoopTask {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

struct ControllerShared {
    region: Option<Region>,
    settings: TranslationSettings,
    last_result: Option<SubtitleResult>,
    running: bool,
    status: StatusUpdate,
    clock: ResultClock,
    /// Hash of the last processed text, kept across stop/start so a restart
    /// does not republish the subtitle still sitting on screen
    last_text_hash: Option<String>,
    loop_task: Option<LoopTask>,
}

/// Orchestrates the capture, recognize, translate, publish cycle
#[derive(Clone)]
pub struct CaptureController {
    shared: Arc<Mutex<ControllerShared>>,
    config: Arc<Config>,
    capture: Arc<dyn CaptureSource>,
    ocr: Arc<dyn OcrEngine>,
    router: Arc<TranslationRouter>,
    bus: EventBus,
    channel: SubtitleChannel,
}

impl CaptureController {
    pub fn new(
        config: Arc<Config>,
        capture: Arc<dyn CaptureSource>,
        ocr: Arc<dyn OcrEngine>,
        router: Arc<TranslationRouter>,
        bus: EventBus,
        channel: SubtitleChannel,
    ) -> Self {
        let shared = ControllerShared {
            region: None,
            settings: config.translation.defaults.clone(),
            last_result: None,
            running: false,
            status: StatusUpdate::new("Ready", StatusSeverity::Warning),
            clock: ResultClock::new(),
            last_text_hash: None,
            loop_task: None,
        };
        Self {
            shared: Arc::new(Mutex::new(shared)),
            config,
            capture,
            ocr,
            router,
            bus,
            channel,
        }
    }

    fn lock_shared(&self) -> MutexGuard<'_, ControllerShared> {
        // Controller state stays consistent after a panicked holder
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Select the screen region to capture from
    pub fn set_region(&self, region: Region) {
        info!(
            "Capture region set to {}x{} at ({}, {})",
            region.width, region.height, region.x, region.y
        );
        self.lock_shared().region = Some(region);
        self.channel.publish_region(Some(&region));
        self.bus.publish(&PipelineEvent::RegionChanged(region));
    }

    /// Replace the translation settings. Takes effect on the next iteration.
    pub fn set_translation_settings(&self, settings: TranslationSettings) {
        debug!(
            "Translation settings changed: enabled={}, {} -> {}",
            settings.enabled, settings.source_language, settings.target_language
        );
        self.lock_shared().settings = settings.clone();
        self.bus.publish(&PipelineEvent::SettingsChanged(settings));
    }

    /// Snapshot of the externally visible state
    pub fn state(&self) -> ControllerState {
        let shared = self.lock_shared();
        ControllerState {
            region: shared.region,
            settings: shared.settings.clone(),
            last_result: shared.last_result.clone(),
            running: shared.running,
            status: shared.status.clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_shared().running
    }

    /// Classify whether the current settings can produce translations
    pub fn translation_readiness(&self) -> TranslationReadiness {
        let settings = self.lock_shared().settings.clone();
        self.router.readiness(&settings)
    }

    /// Start the capture loop.
    ///
    /// Ignored when already running or no region is selected. Refused with a
    /// status update when translation is enabled but no installed route
    /// exists for the selected languages. Returns whether the loop started.
    pub async fn start(&self) -> bool {
        let mut shared = self.lock_shared();
        if shared.running {
            debug!("Start ignored: capture already running");
            return false;
        }
        if shared.region.is_none() {
            debug!("Start ignored: no capture region selected");
            return false;
        }

        let settings = shared.settings.clone();
        if settings.enabled
            && !self
                .router
                .can_translate(&settings.source_language, &settings.target_language)
        {
            drop(shared);
            warn!(
                "Start refused: no installed route for {} -> {}",
                settings.source_language, settings.target_language
            );
            self.update_status("Translation package required", StatusSeverity::Warning);
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(capture_loop(self.clone(), cancel.clone()));
        shared.running = true;
        shared.loop_task = Some(LoopTask { handle, cancel });
        drop(shared);

        self.update_status("Running OCR and translation...", StatusSeverity::Info);
        self.bus.publish(&PipelineEvent::CaptureStarted);
        info!("Capture started");
        true
    }

    /// Stop the capture loop and wait for it to wind down.
    ///
    /// Safe to call at any time; the stopped status and event go out even
    /// when nothing was running.
    pub async fn stop(&self) {
        let task = {
            let mut shared = self.lock_shared();
            shared.running = false;
            shared.loop_task.take()
        };

        if let Some(task) = task {
            task.cancel.cancel();
            let grace = Duration::from_millis(self.config.timing.stop_grace_ms);
            match tokio::time::timeout(grace, task.handle).await {
                Ok(Ok(())) => debug!("Capture loop exited cleanly"),
                Ok(Err(e)) => warn!("Capture loop task failed: {}", e),
                Err(_) => warn!("Capture loop did not stop within {:?}", grace),
            }
        }

        self.update_status("Stopped", StatusSeverity::Warning);
        self.bus.publish(&PipelineEvent::CaptureStopped);
        info!("Capture stopped");
    }

    /// Install every package the current language pair needs
    pub async fn install_translation_packages(&self) -> InstallReport {
        let settings = self.lock_shared().settings.clone();
        self.update_status("Installing translation packages", StatusSeverity::Info);

        let report = self
            .router
            .install_path(&settings.source_language, &settings.target_language)
            .await;

        if report.success {
            self.update_status("Translation packages installed", StatusSeverity::Info);
        } else if report.failed > 0 {
            self.update_status(
                &format!("Failed to install {} package(s)", report.failed),
                StatusSeverity::Error,
            );
        } else {
            self.update_status("No translation route available", StatusSeverity::Error);
        }
        report
    }

    /// Stop the loop and clear all published state. Call on shutdown.
    pub async fn cleanup(&self) {
        self.stop().await;
        self.channel.clear();
        debug!("Published pipeline state cleared");
    }

    fn update_status(&self, message: &str, severity: StatusSeverity) {
        let status = StatusUpdate::new(message, severity);
        debug!("Status: {} ({})", status.message, status.severity.as_str());
        self.lock_shared().status = status.clone();
        self.bus.publish(&PipelineEvent::StatusChanged(status));
    }
}

async fn capture_loop(controller: CaptureController, cancel: CancellationToken) {
    let interval = Duration::from_millis(controller.config.timing.capture_interval_ms);
    let backoff = Duration::from_millis(controller.config.timing.error_backoff_ms);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel.cancelled() => break,
        }

        if let Err(e) = run_iteration(&controller, &cancel).await {
            warn!("Capture iteration failed: {}", e);
            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = cancel.cancelled() => break,
            }
        }
    }

    debug!("Capture loop exited");
}

/// One capture, recognize, translate, publish pass
async fn run_iteration(
    controller: &CaptureController,
    cancel: &CancellationToken,
) -> Result<(), CaptureError> {
    let (region, settings) = {
        let shared = controller.lock_shared();
        (shared.region, shared.settings.clone())
    };
    let region = match region {
        Some(region) => region,
        None => return Ok(()),
    };

    let frame = controller.capture.capture(&region).await?;
    let bias = ocr_language_tag(&settings.source_language);
    let raw = controller.ocr.recognize(&frame, bias).await;
    let text = clean_recognized_text(&raw);
    if text.is_empty() {
        trace!("Nothing recognized in the capture region");
        return Ok(());
    }

    let hash = text_hash(&text);
    {
        let mut shared = controller.lock_shared();
        if shared.last_text_hash.as_deref() == Some(hash.as_str()) {
            trace!("Recognized text unchanged, skipping");
            return Ok(());
        }
        shared.last_text_hash = Some(hash);
    }

    let result = process_text(controller, &text, &settings).await;

    // Don't publish into a pipeline that is stopping
    if cancel.is_cancelled() {
        return Ok(());
    }

    controller.lock_shared().last_result = Some(result.clone());
    controller.channel.publish(Some(&result));
    controller.bus.publish(&PipelineEvent::SubtitleUpdated(result));
    Ok(())
}

/// Build the result for one recognized text, translating when possible.
///
/// `is_translated` reflects the decision to translate, not the engine
/// outcome; a mid-chain engine failure falls back to the original text.
async fn process_text(
    controller: &CaptureController,
    text: &str,
    settings: &TranslationSettings,
) -> SubtitleResult {
    let translatable = settings.enabled
        && controller
            .router
            .can_translate(&settings.source_language, &settings.target_language);

    let translated_text = if translatable {
        controller
            .router
            .translate(text, &settings.source_language, &settings.target_language)
            .await
    } else {
        text.to_string()
    };

    let created_at = controller.lock_shared().clock.now();
    SubtitleResult {
        original_text: text.to_string(),
        translated_text,
        is_translated: translatable,
        source_language: settings.source_language.clone(),
        target_language: settings.target_language.clone(),
        confidence: OCR_CONFIDENCE,
        created_at,
    }
}

fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::{PackageStore, TranslationEngine, TranslationError};
    use crate::types::LanguagePackage;
    use image::DynamicImage;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    struct StubCapture {
        failures_left: AtomicUsize,
    }

    impl StubCapture {
        fn new() -> Arc<Self> {
            Self::failing_first(0)
        }

        fn failing_first(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                failures_left: AtomicUsize::new(failures),
            })
        }
    }

    #[async_trait::async_trait]
    impl CaptureSource for StubCapture {
        async fn capture(&self, _region: &Region) -> Result<DynamicImage, CaptureError> {
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(CaptureError::Failed("display asleep".to_string()));
            }
            Ok(DynamicImage::new_rgba8(4, 4))
        }
    }

    /// Serves scripted lines in order, then repeats the last one
    struct ScriptedOcr {
        lines: Mutex<VecDeque<String>>,
        last: Mutex<String>,
    }

    impl ScriptedOcr {
        fn new(lines: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                lines: Mutex::new(lines.iter().map(|s| s.to_string()).collect()),
                last: Mutex::new(String::new()),
            })
        }

        fn push(&self, line: &str) {
            self.lines.lock().unwrap().push_back(line.to_string());
        }
    }

    #[async_trait::async_trait]
    impl OcrEngine for ScriptedOcr {
        async fn recognize(&self, _frame: &DynamicImage, _bias: Option<&str>) -> String {
            let mut lines = self.lines.lock().unwrap();
            match lines.pop_front() {
                Some(next) => {
                    *self.last.lock().unwrap() = next.clone();
                    next
                }
                None => self.last.lock().unwrap().clone(),
            }
        }
    }

    struct TagEngine;

    #[async_trait::async_trait]
    impl TranslationEngine for TagEngine {
        async fn translate(
            &self,
            text: &str,
            from_code: &str,
            to_code: &str,
        ) -> Result<String, TranslationError> {
            Ok(format!("{}|{}>{}", text, from_code, to_code))
        }
    }

    struct FailingEngine;

    #[async_trait::async_trait]
    impl TranslationEngine for FailingEngine {
        async fn translate(
            &self,
            _text: &str,
            _from_code: &str,
            _to_code: &str,
        ) -> Result<String, TranslationError> {
            Err(TranslationError::EngineFailure("engine offline".to_string()))
        }
    }

    /// Install moves a package into the installed list
    struct FakeStore {
        installed: Mutex<Vec<LanguagePackage>>,
        available: Vec<LanguagePackage>,
    }

    impl FakeStore {
        fn new(installed: &[(&str, &str)], available: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                installed: Mutex::new(
                    installed
                        .iter()
                        .map(|(f, t)| LanguagePackage::new(f, t))
                        .collect(),
                ),
                available: available
                    .iter()
                    .map(|(f, t)| LanguagePackage::new(f, t))
                    .collect(),
            })
        }
    }

    #[async_trait::async_trait]
    impl PackageStore for FakeStore {
        async fn list_installed(&self) -> Vec<LanguagePackage> {
            self.installed.lock().unwrap().clone()
        }

        async fn list_available(&self) -> Vec<LanguagePackage> {
            self.available.clone()
        }

        async fn install(&self, from_code: &str, to_code: &str) -> bool {
            self.installed
                .lock()
                .unwrap()
                .push(LanguagePackage::new(from_code, to_code));
            true
        }
    }

    struct TestPipeline {
        controller: CaptureController,
        bus: EventBus,
        channel: SubtitleChannel,
        events: mpsc::UnboundedReceiver<PipelineEvent>,
    }

    async fn build_pipeline(
        capture: Arc<dyn CaptureSource>,
        ocr: Arc<dyn OcrEngine>,
        engine: Arc<dyn TranslationEngine>,
        store: Arc<dyn PackageStore>,
        settings: TranslationSettings,
    ) -> TestPipeline {
        let mut config = Config::default();
        config.timing.capture_interval_ms = 10;
        config.timing.error_backoff_ms = 20;
        config.timing.stop_grace_ms = 1000;
        config.translation.defaults = settings;

        let router = Arc::new(TranslationRouter::new(engine, store, "en").await);
        let bus = EventBus::new();
        let channel = SubtitleChannel::new();
        let controller = CaptureController::new(
            Arc::new(config),
            capture,
            ocr,
            router,
            bus.clone(),
            channel.clone(),
        );

        let (tx, events) = mpsc::unbounded_channel();
        bus.subscribe(move |event| {
            tx.send(event.clone())?;
            Ok(())
        });

        TestPipeline {
            controller,
            bus,
            channel,
            events,
        }
    }

    async fn disabled_pipeline(ocr_lines: &[&str]) -> (TestPipeline, Arc<ScriptedOcr>) {
        let ocr = ScriptedOcr::new(ocr_lines);
        let pipeline = build_pipeline(
            StubCapture::new(),
            Arc::clone(&ocr),
            Arc::new(TagEngine),
            FakeStore::new(&[], &[]),
            TranslationSettings::default(),
        )
        .await;
        (pipeline, ocr)
    }

    fn test_region() -> Region {
        Region::new(0, 0, 640, 120).unwrap()
    }

    async fn next_subtitle(rx: &mut mpsc::UnboundedReceiver<PipelineEvent>) -> SubtitleResult {
        loop {
            let event = timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("timed out waiting for a subtitle")
                .expect("event stream closed");
            if let PipelineEvent::SubtitleUpdated(result) = event {
                return result;
            }
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<PipelineEvent>) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn subtitle_count(events: &[PipelineEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, PipelineEvent::SubtitleUpdated(_)))
            .count()
    }

    #[tokio::test]
    async fn test_start_requires_region() {
        let (mut pipeline, _ocr) = disabled_pipeline(&["hello"]).await;

        assert!(!pipeline.controller.start().await);
        assert!(!pipeline.controller.is_running());

        let events = drain(&mut pipeline.events);
        assert!(!events
            .iter()
            .any(|e| matches!(e, PipelineEvent::CaptureStarted)));
    }

    #[tokio::test]
    async fn test_start_twice_is_ignored() {
        let (pipeline, _ocr) = disabled_pipeline(&["hello"]).await;
        pipeline.controller.set_region(test_region());

        assert!(pipeline.controller.start().await);
        assert!(pipeline.controller.is_running());
        assert!(!pipeline.controller.start().await);

        pipeline.controller.stop().await;
        assert!(!pipeline.controller.is_running());
    }

    #[tokio::test]
    async fn test_start_refused_without_installed_route() {
        let settings = TranslationSettings {
            enabled: true,
            source_language: "en".to_string(),
            target_language: "fr".to_string(),
        };
        let mut pipeline = build_pipeline(
            StubCapture::new(),
            ScriptedOcr::new(&["hello"]),
            Arc::new(TagEngine),
            FakeStore::new(&[], &[]),
            settings,
        )
        .await;
        pipeline.controller.set_region(test_region());

        assert!(!pipeline.controller.start().await);
        assert!(!pipeline.controller.is_running());

        let state = pipeline.controller.state();
        assert_eq!(state.status.message, "Translation package required");
        assert_eq!(state.status.severity, StatusSeverity::Warning);

        let events = drain(&mut pipeline.events);
        assert!(!events
            .iter()
            .any(|e| matches!(e, PipelineEvent::CaptureStarted)));
    }

    #[tokio::test]
    async fn test_capture_produces_untranslated_subtitle() {
        let (mut pipeline, _ocr) = disabled_pipeline(&["Hello   World\n"]).await;
        pipeline.controller.set_region(test_region());
        assert!(pipeline.controller.start().await);

        let result = next_subtitle(&mut pipeline.events).await;
        assert_eq!(result.original_text, "Hello World");
        assert_eq!(result.translated_text, "Hello World");
        assert!(!result.is_translated);
        assert_eq!(result.confidence, OCR_CONFIDENCE);

        let snapshot = pipeline.channel.read().expect("channel should hold the result");
        assert_eq!(snapshot.original_text, "Hello World");
        assert_eq!(snapshot.timestamp, result.created_at);

        let state = pipeline.controller.state();
        assert_eq!(state.last_result, Some(result));

        pipeline.controller.stop().await;
    }

    #[tokio::test]
    async fn test_duplicate_text_published_once() {
        let (mut pipeline, ocr) = disabled_pipeline(&["same line"]).await;
        pipeline.controller.set_region(test_region());
        assert!(pipeline.controller.start().await);

        let first = next_subtitle(&mut pipeline.events).await;
        assert_eq!(first.original_text, "same line");

        // The scripted recognizer keeps returning the same line
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(subtitle_count(&drain(&mut pipeline.events)), 0);

        ocr.push("a new line");
        let second = next_subtitle(&mut pipeline.events).await;
        assert_eq!(second.original_text, "a new line");
        assert!(second.created_at > first.created_at);

        pipeline.controller.stop().await;
    }

    #[tokio::test]
    async fn test_empty_recognition_produces_nothing() {
        let (mut pipeline, _ocr) = disabled_pipeline(&["", "   \n  "]).await;
        pipeline.controller.set_region(test_region());
        assert!(pipeline.controller.start().await);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(subtitle_count(&drain(&mut pipeline.events)), 0);

        pipeline.controller.stop().await;
    }

    #[tokio::test]
    async fn test_translation_chains_through_pivot() {
        let settings = TranslationSettings {
            enabled: true,
            source_language: "it".to_string(),
            target_language: "fr".to_string(),
        };
        let mut pipeline = build_pipeline(
            StubCapture::new(),
            ScriptedOcr::new(&["ciao"]),
            Arc::new(TagEngine),
            FakeStore::new(&[("it", "en"), ("en", "fr")], &[]),
            settings,
        )
        .await;
        pipeline.controller.set_region(test_region());
        assert!(pipeline.controller.start().await);

        let result = next_subtitle(&mut pipeline.events).await;
        assert_eq!(result.translated_text, "ciao|it>en|en>fr");
        assert!(result.is_translated);
        assert_eq!(result.source_language, "it");
        assert_eq!(result.target_language, "fr");

        pipeline.controller.stop().await;
    }

    #[tokio::test]
    async fn test_engine_failure_falls_back_to_original() {
        let settings = TranslationSettings {
            enabled: true,
            source_language: "it".to_string(),
            target_language: "en".to_string(),
        };
        let mut pipeline = build_pipeline(
            StubCapture::new(),
            ScriptedOcr::new(&["ciao"]),
            Arc::new(FailingEngine),
            FakeStore::new(&[("it", "en")], &[]),
            settings,
        )
        .await;
        pipeline.controller.set_region(test_region());
        assert!(pipeline.controller.start().await);

        let result = next_subtitle(&mut pipeline.events).await;
        assert_eq!(result.translated_text, "ciao");
        // The decision to translate stands even though the engine failed
        assert!(result.is_translated);

        pipeline.controller.stop().await;
    }

    #[tokio::test]
    async fn test_loop_recovers_after_capture_failures() {
        let (tx, mut events) = mpsc::unbounded_channel();
        let pipeline = build_pipeline(
            StubCapture::failing_first(2),
            ScriptedOcr::new(&["recovered"]),
            Arc::new(TagEngine),
            FakeStore::new(&[], &[]),
            TranslationSettings::default(),
        )
        .await;
        pipeline.bus.subscribe(move |event| {
            tx.send(event.clone())?;
            Ok(())
        });
        pipeline.controller.set_region(test_region());
        assert!(pipeline.controller.start().await);

        let result = next_subtitle(&mut events).await;
        assert_eq!(result.original_text, "recovered");

        pipeline.controller.stop().await;
    }

    #[tokio::test]
    async fn test_stop_publishes_even_when_idle() {
        let (mut pipeline, _ocr) = disabled_pipeline(&[]).await;

        pipeline.controller.stop().await;

        let state = pipeline.controller.state();
        assert_eq!(state.status.message, "Stopped");
        assert_eq!(state.status.severity, StatusSeverity::Warning);

        let events = drain(&mut pipeline.events);
        assert!(events
            .iter()
            .any(|e| matches!(e, PipelineEvent::CaptureStopped)));
    }

    #[tokio::test]
    async fn test_dedup_state_survives_restart() {
        let (mut pipeline, _ocr) = disabled_pipeline(&["same line"]).await;
        pipeline.controller.set_region(test_region());
        assert!(pipeline.controller.start().await);
        let _ = next_subtitle(&mut pipeline.events).await;

        pipeline.controller.stop().await;
        assert!(pipeline.controller.start().await);

        // The same text on screen must not republish after a restart
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(subtitle_count(&drain(&mut pipeline.events)), 0);

        pipeline.controller.stop().await;
    }

    #[tokio::test]
    async fn test_no_subtitle_published_after_stop() {
        let (mut pipeline, ocr) = disabled_pipeline(&["first line"]).await;
        pipeline.controller.set_region(test_region());
        assert!(pipeline.controller.start().await);
        let _ = next_subtitle(&mut pipeline.events).await;

        pipeline.controller.stop().await;
        drain(&mut pipeline.events);

        ocr.push("line after stop");
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(subtitle_count(&drain(&mut pipeline.events)), 0);
    }

    #[tokio::test]
    async fn test_install_reports_success_and_updates_status() {
        let settings = TranslationSettings {
            enabled: true,
            source_language: "it".to_string(),
            target_language: "fr".to_string(),
        };
        let mut pipeline = build_pipeline(
            StubCapture::new(),
            ScriptedOcr::new(&[]),
            Arc::new(TagEngine),
            FakeStore::new(&[], &[("it", "en"), ("en", "fr")]),
            settings,
        )
        .await;

        assert!(matches!(
            pipeline.controller.translation_readiness(),
            TranslationReadiness::NeedsInstall { .. }
        ));

        let report = pipeline.controller.install_translation_packages().await;
        assert!(report.success);
        assert_eq!(report.installed, 2);
        assert_eq!(report.failed, 0);

        let state = pipeline.controller.state();
        assert_eq!(state.status.message, "Translation packages installed");
        assert!(matches!(
            pipeline.controller.translation_readiness(),
            TranslationReadiness::Ready { .. }
        ));

        let messages: Vec<String> = drain(&mut pipeline.events)
            .into_iter()
            .filter_map(|e| match e {
                PipelineEvent::StatusChanged(status) => Some(status.message),
                _ => None,
            })
            .collect();
        assert!(messages.contains(&"Installing translation packages".to_string()));
    }

    #[tokio::test]
    async fn test_install_failure_updates_status() {
        let settings = TranslationSettings {
            enabled: true,
            source_language: "it".to_string(),
            target_language: "xx".to_string(),
        };
        let pipeline = build_pipeline(
            StubCapture::new(),
            ScriptedOcr::new(&[]),
            Arc::new(TagEngine),
            FakeStore::new(&[], &[]),
            settings,
        )
        .await;

        let report = pipeline.controller.install_translation_packages().await;
        assert!(!report.success);
        assert!(report.requested.is_empty());

        let state = pipeline.controller.state();
        assert_eq!(state.status.message, "No translation route available");
        assert_eq!(state.status.severity, StatusSeverity::Error);
    }

    #[tokio::test]
    async fn test_set_region_publishes_snapshot_and_event() {
        let (mut pipeline, _ocr) = disabled_pipeline(&[]).await;
        let region = test_region();

        pipeline.controller.set_region(region);

        let snapshot = pipeline
            .channel
            .read_region()
            .expect("region snapshot should be published");
        assert_eq!(snapshot.to_region(), Some(region));

        let events = drain(&mut pipeline.events);
        assert!(events
            .iter()
            .any(|e| matches!(e, PipelineEvent::RegionChanged(r) if *r == region)));
    }

    #[tokio::test]
    async fn test_set_settings_publishes_event() {
        let (mut pipeline, _ocr) = disabled_pipeline(&[]).await;
        let settings = TranslationSettings {
            enabled: true,
            source_language: "de".to_string(),
            target_language: "en".to_string(),
        };

        pipeline.controller.set_translation_settings(settings.clone());

        assert_eq!(pipeline.controller.state().settings, settings);
        let events = drain(&mut pipeline.events);
        assert!(events
            .iter()
            .any(|e| matches!(e, PipelineEvent::SettingsChanged(s) if *s == settings)));
    }

    #[tokio::test]
    async fn test_cleanup_stops_and_clears_channel() {
        let (mut pipeline, _ocr) = disabled_pipeline(&["hello"]).await;
        pipeline.controller.set_region(test_region());
        assert!(pipeline.controller.start().await);
        let _ = next_subtitle(&mut pipeline.events).await;
        assert!(pipeline.channel.read().is_some());

        pipeline.controller.cleanup().await;

        assert!(!pipeline.controller.is_running());
        assert!(pipeline.channel.read().is_none());
        assert!(pipeline.channel.read_region().is_none());
    }
}
