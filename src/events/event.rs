//! # Runtime events emitted by topics and the instance registry.
//!
//! The [`EventKind`] enum classifies event types across two categories:
//! - **Topic events**: membership changes, publishes, per-subscriber failures, teardown
//! - **Registry events**: instance construction outcomes
//!
//! The [`Event`] struct carries additional metadata such as timestamps, topic and
//! subscriber names, registry keys and delivery counts.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use topicvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::DeliveryFailed)
//!     .with_topic("orders")
//!     .with_subscriber("audit")
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind, EventKind::DeliveryFailed);
//! assert_eq!(ev.topic.as_deref(), Some("orders"));
//! assert_eq!(ev.reason.as_deref(), Some("boom"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Topic events ===
    /// A subscriber was newly registered on a topic.
    ///
    /// Sets:
    /// - `topic`: topic name
    /// - `subscriber`: subscriber id
    Subscribed,

    /// A subscriber was removed from a topic.
    ///
    /// Sets:
    /// - `topic`: topic name
    /// - `subscriber`: subscriber id
    Unsubscribed,

    /// A publish call finished walking its snapshot.
    ///
    /// Sets:
    /// - `topic`: topic name
    /// - `delivered`: successful deliveries
    /// - `failed`: failed deliveries
    Published,

    /// A subscriber returned an error or timed out.
    ///
    /// Sets:
    /// - `topic`: topic name
    /// - `subscriber`: subscriber id
    /// - `reason`: error message
    DeliveryFailed,

    /// A subscriber panicked while receiving.
    ///
    /// Sets:
    /// - `topic`: topic name
    /// - `subscriber`: subscriber id
    /// - `reason`: panic info
    SubscriberPanicked,

    /// The topic was torn down.
    ///
    /// Sets:
    /// - `topic`: topic name
    TopicClosed,

    // === Registry events ===
    /// A registry instance finished construction.
    ///
    /// Sets:
    /// - `key`: registry key
    InstanceCreated,

    /// A registry factory failed (or re-entered itself).
    ///
    /// Sets:
    /// - `key`: registry key
    /// - `reason`: error message
    ConstructionFailed,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Topic name, if applicable.
    pub topic: Option<Arc<str>>,
    /// Subscriber id, if applicable.
    pub subscriber: Option<Arc<str>>,
    /// Registry key, if applicable.
    pub key: Option<Arc<str>>,
    /// Human-readable reason (errors, panic details, etc.).
    pub reason: Option<Arc<str>>,
    /// Successful deliveries of a publish.
    pub delivered: Option<u32>,
    /// Failed deliveries of a publish.
    pub failed: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            topic: None,
            subscriber: None,
            key: None,
            reason: None,
            delivered: None,
            failed: None,
        }
    }

    /// Attaches a topic name.
    #[inline]
    pub fn with_topic(mut self, topic: impl Into<Arc<str>>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Attaches a subscriber id.
    #[inline]
    pub fn with_subscriber(mut self, subscriber: impl Into<Arc<str>>) -> Self {
        self.subscriber = Some(subscriber.into());
        self
    }

    /// Attaches a registry key.
    #[inline]
    pub fn with_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches publish counters (saturated to `u32`).
    #[inline]
    pub fn with_counts(mut self, delivered: usize, failed: usize) -> Self {
        self.delivered = Some(u32::try_from(delivered).unwrap_or(u32::MAX));
        self.failed = Some(u32::try_from(failed).unwrap_or(u32::MAX));
        self
    }

    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(
            self.kind,
            EventKind::DeliveryFailed | EventKind::SubscriberPanicked | EventKind::ConstructionFailed
        )
    }
}
