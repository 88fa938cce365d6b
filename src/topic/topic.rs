//! # Topic: named, ordered subscriber registry.
//!
//! A [`Topic`] owns an insertion-ordered set of subscriber registrations and publishes
//! opaque payloads to them through a [`NotificationDispatcher`].
//!
//! ## Rules
//! - **Idempotent membership**: subscribing an id twice is a no-op, unsubscribing an
//!   absent id is a no-op.
//! - **Single lock**: every structural mutation and the publish snapshot run under one
//!   per-topic `RwLock`; no subscriber callback ever runs while it is held.
//! - **Deterministic order**: registrations keep insertion order; unsubscribe preserves
//!   the relative order of the rest.
//! - **Explicit teardown**: a topic lives until [`Topic::teardown`]; handles are cheap
//!   clones of one shared state.
//!
//! ## Example
//! ```rust
//! use topicvisor::{Subscriber, Topic};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let topic: Topic<String> = Topic::new("uploads");
//! let amit = Subscriber::from_fn("amit", |title: &String| {
//!     println!("Hey amit, {title}");
//!     Ok(())
//! });
//!
//! assert!(topic.subscribe(&amit).await);
//! assert!(!topic.subscribe(&amit).await);
//!
//! let report = topic.publish("new video".to_string()).await;
//! assert_eq!(report.subscribers(), ["amit"]);
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::TopicConfig;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscriber;
use crate::topic::{DeliveryReport, NotificationDispatcher};

/// Mutable part of a topic, guarded by the topic lock.
struct TopicState<T> {
    /// Subscriber registrations in insertion order.
    registrations: Vec<Subscriber<T>>,
    /// Last published payload (only with `retain_last`).
    last: Option<Arc<T>>,
}

/// State shared by every handle of one topic.
pub(crate) struct TopicShared<T> {
    pub(crate) name: Arc<str>,
    config: TopicConfig,
    state: RwLock<TopicState<T>>,
    closed: CancellationToken,
    dispatcher: NotificationDispatcher,
    bus: Option<Bus>,
}

/// Named registry of subscribers and the unit of publish/subscribe.
pub struct Topic<T> {
    shared: Arc<TopicShared<T>>,
}

impl<T: Send + Sync + 'static> Topic<T> {
    /// Creates a topic with default configuration and no event bus.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self::builder(name).build()
    }

    /// Creates a topic with the given configuration.
    pub fn with_config(name: impl Into<Arc<str>>, config: TopicConfig) -> Self {
        Self::builder(name).config(config).build()
    }

    /// Starts building a topic.
    pub fn builder(name: impl Into<Arc<str>>) -> TopicBuilder<T> {
        TopicBuilder::new(name)
    }

    pub(crate) fn from_shared(shared: Arc<TopicShared<T>>) -> Self {
        Self { shared }
    }

    /// Topic name (immutable).
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.shared.name)
    }

    pub fn config(&self) -> &TopicConfig {
        &self.shared.config
    }

    /// Registers a subscriber.
    ///
    /// Returns `true` if this call added it, `false` if the id was already registered
    /// or the topic is torn down. With `retain_last`, a newly added subscriber then
    /// receives the retained payload (if any) before this call returns.
    pub async fn subscribe(&self, subscriber: &Subscriber<T>) -> bool {
        let retained = {
            let mut state = self.shared.state.write().await;
            if self.shared.closed.is_cancelled() {
                tracing::debug!(
                    topic = %self.shared.name,
                    subscriber = subscriber.id(),
                    "subscribe on a torn-down topic ignored"
                );
                return false;
            }
            if state.registrations.iter().any(|s| s == subscriber) {
                return false;
            }
            state.registrations.push(subscriber.clone());
            subscriber.attach(&self.shared);
            state.last.clone()
        };

        tracing::debug!(topic = %self.shared.name, subscriber = subscriber.id(), "subscribed");
        self.emit(EventKind::Subscribed, Some(subscriber));

        if let Some(payload) = retained {
            self.replay(subscriber, &payload).await;
        }
        true
    }

    /// Hands the retained `payload` to a subscriber that just joined.
    ///
    /// Skipped if a newer payload has been published since: that publish already
    /// included the newcomer. A publish that starts while the replay is running may
    /// still reach the newcomer before the replay finishes.
    pub(crate) async fn replay(&self, subscriber: &Subscriber<T>, payload: &Arc<T>) -> bool {
        let current = {
            let state = self.shared.state.read().await;
            !self.shared.closed.is_cancelled()
                && state.last.as_ref().is_some_and(|last| Arc::ptr_eq(last, payload))
        };
        if !current {
            tracing::debug!(
                topic = %self.shared.name,
                subscriber = subscriber.id(),
                "retained payload superseded; replay skipped"
            );
            return false;
        }

        let outcome = self
            .shared
            .dispatcher
            .deliver_one(&self.shared.name, subscriber, payload)
            .await;
        tracing::debug!(
            topic = %self.shared.name,
            subscriber = subscriber.id(),
            ok = outcome.is_ok(),
            "retained payload replayed"
        );
        true
    }

    /// Removes a subscriber by id (a [`Subscriber`] works too).
    ///
    /// Returns `true` if a registration was removed; an unknown id is a no-op.
    pub async fn unsubscribe(&self, id: impl AsRef<str>) -> bool {
        let id = id.as_ref();
        let removed = {
            let mut state = self.shared.state.write().await;
            match state.registrations.iter().position(|s| s.id() == id) {
                Some(pos) => {
                    let sub = state.registrations.remove(pos);
                    sub.detach(&self.shared);
                    Some(sub)
                }
                None => None,
            }
        };

        match removed {
            Some(sub) => {
                tracing::debug!(topic = %self.shared.name, subscriber = id, "unsubscribed");
                self.emit(EventKind::Unsubscribed, Some(&sub));
                true
            }
            None => false,
        }
    }

    /// Publishes a payload to the subscribers registered at call time.
    ///
    /// Never fails because of subscribers; see [`DeliveryReport`].
    pub async fn publish(&self, payload: T) -> DeliveryReport {
        self.shared
            .dispatcher
            .dispatch(self, Arc::new(payload))
            .await
    }

    /// Current number of registrations.
    pub async fn subscriber_count(&self) -> usize {
        self.shared.state.read().await.registrations.len()
    }

    /// Registered ids in delivery order.
    pub async fn subscriber_ids(&self) -> Vec<Arc<str>> {
        self.shared
            .state
            .read()
            .await
            .registrations
            .iter()
            .map(Subscriber::id_arc)
            .collect()
    }

    pub async fn contains(&self, id: impl AsRef<str>) -> bool {
        let id = id.as_ref();
        self.shared
            .state
            .read()
            .await
            .registrations
            .iter()
            .any(|s| s.id() == id)
    }

    /// Last published payload, if the topic retains it.
    pub async fn last_payload(&self) -> Option<Arc<T>> {
        self.shared.state.read().await.last.clone()
    }

    /// Destroys the topic: drops every registration and the retained payload, then
    /// fires the close signal.
    ///
    /// Returns the number of registrations dropped; a second call returns 0.
    pub async fn teardown(&self) -> usize {
        let dropped = {
            let mut state = self.shared.state.write().await;
            if self.shared.closed.is_cancelled() {
                return 0;
            }
            self.shared.closed.cancel();
            state.last = None;
            let registrations = std::mem::take(&mut state.registrations);
            for sub in &registrations {
                sub.detach(&self.shared);
            }
            registrations.len()
        };

        tracing::debug!(topic = %self.shared.name, dropped, "topic torn down");
        self.emit(EventKind::TopicClosed, None);
        dropped
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.is_cancelled()
    }

    /// Resolves once the topic has been torn down.
    pub async fn closed(&self) {
        self.shared.closed.cancelled().await;
    }

    /// Copies the registrations for a publish, storing the payload if retained.
    ///
    /// `None` if the topic is torn down.
    pub(crate) async fn snapshot_for(&self, payload: &Arc<T>) -> Option<Vec<Subscriber<T>>> {
        if self.shared.config.retain_last {
            let mut state = self.shared.state.write().await;
            if self.shared.closed.is_cancelled() {
                return None;
            }
            state.last = Some(Arc::clone(payload));
            Some(state.registrations.clone())
        } else {
            let state = self.shared.state.read().await;
            if self.shared.closed.is_cancelled() {
                return None;
            }
            Some(state.registrations.clone())
        }
    }

    fn emit(&self, kind: EventKind, subscriber: Option<&Subscriber<T>>) {
        if let Some(bus) = &self.shared.bus {
            let mut ev = Event::new(kind).with_topic(self.name_arc());
            if let Some(sub) = subscriber {
                ev = ev.with_subscriber(sub.id_arc());
            }
            bus.publish(ev);
        }
    }
}

impl<T> Clone for Topic<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Topic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic")
            .field("name", &self.shared.name)
            .field("closed", &self.shared.closed.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Topic`].
pub struct TopicBuilder<T> {
    name: Arc<str>,
    config: TopicConfig,
    bus: Option<Bus>,
    _payload: std::marker::PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> TopicBuilder<T> {
    /// Creates a new builder with default configuration.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            config: TopicConfig::default(),
            bus: None,
            _payload: std::marker::PhantomData,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: TopicConfig) -> Self {
        self.config = config;
        self
    }

    /// Keeps the last payload for late joiners.
    pub fn retain_last(mut self, retain: bool) -> Self {
        self.config.retain_last = retain;
        self
    }

    /// Default per-subscriber timeout (`Duration::ZERO` = none).
    pub fn delivery_timeout(mut self, timeout: Duration) -> Self {
        self.config.delivery_timeout = timeout;
        self
    }

    /// Publishes topic and delivery events on `bus`.
    pub fn bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub(crate) fn maybe_bus(mut self, bus: Option<Bus>) -> Self {
        self.bus = bus;
        self
    }

    /// Builds the topic.
    pub fn build(self) -> Topic<T> {
        let dispatcher = NotificationDispatcher::new(self.config.timeout(), self.bus.clone());
        Topic {
            shared: Arc::new(TopicShared {
                name: self.name,
                config: self.config,
                state: RwLock::new(TopicState {
                    registrations: Vec::new(),
                    last: None,
                }),
                closed: CancellationToken::new(),
                dispatcher,
                bus: self.bus,
            }),
        }
    }
}
