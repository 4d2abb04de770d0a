//! Cross-surface state channel.
//!
//! The main panel and the detached subtitle overlay run as independent
//! surfaces with no direct call path between them. This channel holds the
//! latest snapshot of each piece of shared state (current subtitle, selected
//! region, overlay liveness) behind a shared lock. Writers overwrite in
//! place; readers poll on their own cadence and apply a snapshot only when
//! its timestamp is strictly newer than the last one they saw, so a slow
//! reader skips straight to the freshest state instead of replaying history.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::types::{wall_seconds, Region, SubtitleResult};

/// Version tag written into every snapshot
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SNAPSHOT_SCHEMA_VERSION
}

/// Persisted form of the latest subtitle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleSnapshot {
    #[serde(default)]
    pub original_text: String,
    #[serde(default)]
    pub translated_text: String,
    #[serde(default)]
    pub is_translated: bool,
    #[serde(default)]
    pub source_language: String,
    #[serde(default)]
    pub target_language: String,
    #[serde(default)]
    pub confidence: f64,
    /// Producer-side creation stamp; consumers compare these for staleness
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

impl SubtitleSnapshot {
    pub fn from_result(result: &SubtitleResult) -> Self {
        Self {
            original_text: result.original_text.clone(),
            translated_text: result.translated_text.clone(),
            is_translated: result.is_translated,
            source_language: result.source_language.clone(),
            target_language: result.target_language.clone(),
            confidence: result.confidence,
            timestamp: result.created_at,
            schema_version: SNAPSHOT_SCHEMA_VERSION,
        }
    }
}

/// Persisted form of the selected capture region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSnapshot {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

impl RegionSnapshot {
    fn from_region(region: &Region, timestamp: f64) -> Self {
        Self {
            x: region.x,
            y: region.y,
            width: region.width,
            height: region.height,
            timestamp,
            schema_version: SNAPSHOT_SCHEMA_VERSION,
        }
    }

    /// Rebuild the region, rejecting snapshots with degenerate sizes
    pub fn to_region(&self) -> Option<Region> {
        Region::new(self.x, self.y, self.width, self.height).ok()
    }
}

/// Persisted overlay liveness flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivenessFlag {
    #[serde(default)]
    pub is_detached: bool,
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

#[derive(Debug, Default)]
struct ChannelState {
    subtitle: Option<SubtitleSnapshot>,
    region: Option<RegionSnapshot>,
    liveness: Option<LivenessFlag>,
}

/// Cloneable handle onto the shared snapshot store.
///
/// Writes are last-write-wins; a failed lock is logged and the write dropped
/// (reads return `None`), so channel trouble never takes the pipeline down.
#[derive(Clone, Default)]
pub struct SubtitleChannel {
    inner: Arc<RwLock<ChannelState>>,
}

impl SubtitleChannel {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(ChannelState::default())),
        }
    }

    /// Store the latest subtitle, or clear the slot with `None`
    pub fn publish(&self, result: Option<&SubtitleResult>) {
        let mut state = match self.inner.write() {
            Ok(guard) => guard,
            Err(e) => {
                warn!("Subtitle channel write failed: {}", e);
                return;
            }
        };
        state.subtitle = result.map(SubtitleSnapshot::from_result);
    }

    /// Latest subtitle snapshot, if one has been published
    pub fn read(&self) -> Option<SubtitleSnapshot> {
        match self.inner.read() {
            Ok(state) => state.subtitle.clone(),
            Err(e) => {
                warn!("Subtitle channel read failed: {}", e);
                None
            }
        }
    }

    /// Store the selected capture region, or clear the slot with `None`
    pub fn publish_region(&self, region: Option<&Region>) {
        let snapshot = region.map(|r| RegionSnapshot::from_region(r, wall_seconds()));
        let mut state = match self.inner.write() {
            Ok(guard) => guard,
            Err(e) => {
                warn!("Region snapshot write failed: {}", e);
                return;
            }
        };
        state.region = snapshot;
    }

    /// Latest region snapshot, if one has been published
    pub fn read_region(&self) -> Option<RegionSnapshot> {
        match self.inner.read() {
            Ok(state) => state.region.clone(),
            Err(e) => {
                warn!("Region snapshot read failed: {}", e);
                None
            }
        }
    }

    /// Record whether the overlay is currently detached
    pub fn set_liveness(&self, is_detached: bool) {
        let flag = LivenessFlag {
            is_detached,
            timestamp: wall_seconds(),
            schema_version: SNAPSHOT_SCHEMA_VERSION,
        };
        let mut state = match self.inner.write() {
            Ok(guard) => guard,
            Err(e) => {
                warn!("Liveness flag write failed: {}", e);
                return;
            }
        };
        debug!("Overlay liveness set to {}", is_detached);
        state.liveness = Some(flag);
    }

    /// Whether the overlay currently reports itself detached. Defaults to
    /// false when the flag was never written or the lock failed.
    pub fn get_liveness(&self) -> bool {
        match self.inner.read() {
            Ok(state) => state
                .liveness
                .as_ref()
                .map(|flag| flag.is_detached)
                .unwrap_or(false),
            Err(e) => {
                warn!("Liveness flag read failed: {}", e);
                false
            }
        }
    }

    /// Drop every persisted snapshot
    pub fn clear(&self) {
        let mut state = match self.inner.write() {
            Ok(guard) => guard,
            Err(e) => {
                warn!("Subtitle channel clear failed: {}", e);
                return;
            }
        };
        *state = ChannelState::default();
    }

    /// Spawn the detached overlay's reader loop.
    ///
    /// Polls at `cadence` and hands `sink` each subtitle snapshot whose
    /// timestamp is strictly newer than the previous delivery. Set the
    /// liveness flag before spawning; the loop exits on its own once the
    /// flag reports the overlay closed.
    pub fn spawn_poller<F>(&self, cadence: Duration, mut sink: F) -> JoinHandle<()>
    where
        F: FnMut(SubtitleSnapshot) + Send + 'static,
    {
        let channel = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cadence);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_applied: Option<f64> = None;

            loop {
                ticker.tick().await;

                if !channel.get_liveness() {
                    debug!("Overlay reattached, poller exiting");
                    break;
                }

                if let Some(snapshot) = channel.read() {
                    let newer = last_applied
                        .map(|applied| snapshot.timestamp > applied)
                        .unwrap_or(true);
                    if newer {
                        last_applied = Some(snapshot.timestamp);
                        sink(snapshot);
                    }
                }
            }
        })
    }

    /// Spawn the main surface's liveness monitor.
    ///
    /// Watches the detached flag at `cadence` and calls `on_closed` on every
    /// true to false transition, which is the overlay asking the main surface
    /// to take subtitle display back. Runs until `cancel_token` fires.
    pub fn spawn_liveness_monitor<F>(
        &self,
        cadence: Duration,
        cancel_token: CancellationToken,
        mut on_closed: F,
    ) -> JoinHandle<()>
    where
        F: FnMut() + Send + 'static,
    {
        let channel = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cadence);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut was_detached = channel.get_liveness();

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let detached = channel.get_liveness();
                        if was_detached && !detached {
                            debug!("Overlay closed, notifying main surface");
                            on_closed();
                        }
                        was_detached = detached;
                    }
                    _ = cancel_token.cancelled() => {
                        debug!("Liveness monitor shutting down");
                        break;
                    }
                }
            }
        })
    }
}
