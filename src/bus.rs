//! In-process event bus for pipeline notifications.
//!
//! The capture controller publishes every externally observable transition
//! here; display surfaces and the embedding application subscribe. Delivery
//! is synchronous and in registration order, and a failing subscriber never
//! blocks the ones behind it.

use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

use crate::types::{Region, StatusUpdate, SubtitleResult, TranslationSettings};

/// Events published by the pipeline
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A new capture region was selected
    RegionChanged(Region),
    /// Translation settings were replaced
    SettingsChanged(TranslationSettings),
    /// The capture loop started
    CaptureStarted,
    /// The capture loop stopped
    CaptureStopped,
    /// The status line changed
    StatusChanged(StatusUpdate),
    /// A fresh subtitle result was produced
    SubtitleUpdated(SubtitleResult),
}

impl PipelineEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PipelineEvent::RegionChanged(_) => EventKind::RegionChanged,
            PipelineEvent::SettingsChanged(_) => EventKind::SettingsChanged,
            PipelineEvent::CaptureStarted => EventKind::CaptureStarted,
            PipelineEvent::CaptureStopped => EventKind::CaptureStopped,
            PipelineEvent::StatusChanged(_) => EventKind::StatusChanged,
            PipelineEvent::SubtitleUpdated(_) => EventKind::SubtitleUpdated,
        }
    }
}

/// Discriminant for event filtering and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RegionChanged,
    SettingsChanged,
    CaptureStarted,
    CaptureStopped,
    StatusChanged,
    SubtitleUpdated,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::RegionChanged => "region_changed",
            EventKind::SettingsChanged => "settings_changed",
            EventKind::CaptureStarted => "capture_started",
            EventKind::CaptureStopped => "capture_stopped",
            EventKind::StatusChanged => "status_changed",
            EventKind::SubtitleUpdated => "subtitle_updated",
        }
    }
}

/// Identifier handed out by `subscribe`, used to unsubscribe
pub type SubscriberId = u64;

type SubscriberFn =
    Box<dyn Fn(&PipelineEvent) -> Result<(), Box<dyn std::error::Error + Send + Sync>> + Send + Sync>;

struct Subscriber {
    id: SubscriberId,
    callback: SubscriberFn,
}

/// Synchronous publish/subscribe hub.
///
/// Cloning yields another handle onto the same subscriber list. Callbacks run
/// on the publisher's task and must not call back into the bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

struct BusInner {
    subscribers: Vec<Subscriber>,
    next_id: SubscriberId,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(BusInner {
                subscribers: Vec::new(),
                next_id: 1,
            })),
        }
    }

    /// Register a callback for every published event. Returns the id to pass
    /// to [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn(&PipelineEvent) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
            + Send
            + Sync
            + 'static,
    {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push(Subscriber {
            id,
            callback: Box::new(callback),
        });
        id
    }

    /// Remove a subscriber. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut inner = self.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|sub| sub.id != id);
        inner.subscribers.len() < before
    }

    /// Deliver `event` to every subscriber in registration order.
    ///
    /// A subscriber returning an error is logged and skipped; the remaining
    /// subscribers still receive the event. Returns how many accepted it.
    pub fn publish(&self, event: &PipelineEvent) -> usize {
        let inner = self.lock();
        let mut delivered = 0;
        for sub in &inner.subscribers {
            match (sub.callback)(event) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        "Subscriber {} failed on {}: {}",
                        sub.id,
                        event.kind().as_str(),
                        e
                    );
                }
            }
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, BusInner> {
        // A subscriber list is still usable after a panicked publisher
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_delivery_in_registration_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            bus.subscribe(move |_event| {
                log.lock().unwrap().push(label);
                Ok(())
            });
        }

        let delivered = bus.publish(&PipelineEvent::CaptureStarted);
        assert_eq!(delivered, 3);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_failing_subscriber_does_not_block_others() {
        let bus = EventBus::new();
        let reached = Arc::new(AtomicUsize::new(0));

        bus.subscribe(|_event| Err("subscriber exploded".into()));
        {
            let reached = Arc::clone(&reached);
            bus.subscribe(move |_event| {
                reached.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        let delivered = bus.publish(&PipelineEvent::CaptureStopped);
        assert_eq!(delivered, 1);
        assert_eq!(reached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        let id = {
            let count = Arc::clone(&count);
            bus.subscribe(move |_event| {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        };

        bus.publish(&PipelineEvent::CaptureStarted);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(&PipelineEvent::CaptureStarted);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_clones_share_subscribers() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        {
            let count = Arc::clone(&count);
            bus.subscribe(move |_event| {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        let other = bus.clone();
        other.publish(&PipelineEvent::CaptureStarted);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(other.subscriber_count(), 1);
    }

    #[test]
    fn test_event_kind_names() {
        assert_eq!(
            PipelineEvent::CaptureStarted.kind().as_str(),
            "capture_started"
        );
        assert_eq!(
            PipelineEvent::StatusChanged(StatusUpdate::new(
                "Ready",
                crate::types::StatusSeverity::Info
            ))
            .kind()
            .as_str(),
            "status_changed"
        );
    }
}
