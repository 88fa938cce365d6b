//! # Snapshot-then-dispatch delivery.
//!
//! [`NotificationDispatcher`] drives a publish: it copies the topic's subscriber
//! sequence under the topic lock, releases the lock, then walks the copy.
//!
//! ## Architecture
//! ```text
//! publish(payload)
//!     │
//!     ├──► [topic lock] copy registrations ──► snapshot (Vec<Subscriber>)
//!     │    (brief, no callback runs here)
//!     │
//!     └──► for sub in snapshot (insertion order):
//!              timeout? ─► catch_unwind ─► sub.receive(&payload)
//!                 │             │                 │
//!                 ▼             ▼                 ▼
//!             TimedOut      Panicked        Delivered / Failed
//!                 └─────────────┴────────────────►  DeliveryReport entry
//! ```
//!
//! ## Rules
//! - **Snapshot isolation**: subscribe/unsubscribe during a publish (including from a
//!   subscriber's own `on_payload`) only affects later publishes.
//! - **Deterministic order**: delivery follows the snapshot's insertion order, one
//!   subscriber at a time.
//! - **Per-subscriber isolation**: an error, timeout or panic is recorded and delivery
//!   continues with the next subscriber.
//! - **Not cancellable**: once started, a publish runs to the end of its snapshot.
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
//! if a receiver uses `Arc<Mutex<T>>` and panics while holding the lock.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;

use crate::error::DeliveryError;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscriber;
use crate::topic::{DeliveryOutcome, DeliveryReport, Topic};

/// Walks a subscriber snapshot and records one outcome per subscriber.
#[derive(Clone, Debug, Default)]
pub struct NotificationDispatcher {
    timeout: Option<Duration>,
    bus: Option<Bus>,
}

impl NotificationDispatcher {
    /// Creates a dispatcher.
    ///
    /// `timeout` is the default per-subscriber timeout (`None` = wait forever);
    /// `bus` receives `Published` / `DeliveryFailed` / `SubscriberPanicked` events.
    pub fn new(timeout: Option<Duration>, bus: Option<Bus>) -> Self {
        Self { timeout, bus }
    }

    /// Publishes `payload` to the topic's current subscribers.
    ///
    /// The snapshot is taken at call time; a torn-down topic yields an empty report
    /// flagged [`was_closed`](DeliveryReport::was_closed).
    pub async fn dispatch<T>(&self, topic: &Topic<T>, payload: Arc<T>) -> DeliveryReport
    where
        T: Send + Sync + 'static,
    {
        let Some(snapshot) = topic.snapshot_for(&payload).await else {
            tracing::warn!(topic = topic.name(), "publish on a torn-down topic ignored");
            return DeliveryReport::closed(topic.name_arc());
        };
        self.deliver(topic.name_arc(), &snapshot, &payload).await
    }

    /// Delivers `payload` to every subscriber of `snapshot`, in order.
    pub async fn deliver<T>(
        &self,
        topic: Arc<str>,
        snapshot: &[Subscriber<T>],
        payload: &T,
    ) -> DeliveryReport
    where
        T: Send + Sync + 'static,
    {
        let mut report = DeliveryReport::with_capacity(Arc::clone(&topic), snapshot.len());

        for sub in snapshot {
            let outcome = self.deliver_one(&topic, sub, payload).await;
            report.push(sub.id_arc(), outcome.into());
        }

        tracing::debug!(
            topic = %topic,
            delivered = report.delivered(),
            failed = report.failed(),
            "publish finished"
        );
        self.emit(|| {
            Event::new(EventKind::Published)
                .with_topic(Arc::clone(&topic))
                .with_counts(report.delivered(), report.failed())
        });
        report
    }

    /// Delivers to a single subscriber with timeout and panic isolation.
    pub(crate) async fn deliver_one<T>(
        &self,
        topic: &Arc<str>,
        sub: &Subscriber<T>,
        payload: &T,
    ) -> Result<(), DeliveryError>
    where
        T: Send + Sync + 'static,
    {
        // ZERO means "no timeout" on both levels.
        let timeout = match sub.receiver().timeout() {
            Some(own) => Some(own).filter(|d| !d.is_zero()),
            None => self.timeout.filter(|d| !d.is_zero()),
        };
        let fut = std::panic::AssertUnwindSafe(sub.receive(payload)).catch_unwind();

        let caught = match timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(caught) => caught,
                Err(_elapsed) => Ok(Err(DeliveryError::TimedOut { timeout: limit })),
            },
            None => fut.await,
        };

        let result = match caught {
            Ok(result) => result,
            Err(panic_err) => Err(DeliveryError::Panicked {
                info: panic_message(&*panic_err),
            }),
        };

        if let Err(err) = &result {
            tracing::warn!(
                topic = %topic,
                subscriber = sub.id(),
                error = %err,
                label = err.as_label(),
                "delivery failed"
            );
            let kind = match err {
                DeliveryError::Panicked { .. } => EventKind::SubscriberPanicked,
                _ => EventKind::DeliveryFailed,
            };
            self.emit(|| {
                Event::new(kind)
                    .with_topic(Arc::clone(topic))
                    .with_subscriber(sub.id_arc())
                    .with_reason(err.as_message())
            });
        }
        result
    }

    fn emit(&self, make: impl FnOnce() -> Event) {
        if let Some(bus) = &self.bus {
            bus.publish(make());
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::subscribers::{Receive, ReceiveFn};

    struct Sleeper {
        nap: Duration,
        own_timeout: Option<Duration>,
    }

    #[async_trait]
    impl Receive<u8> for Sleeper {
        async fn on_payload(&self, _payload: &u8) -> Result<(), DeliveryError> {
            tokio::time::sleep(self.nap).await;
            Ok(())
        }

        fn timeout(&self) -> Option<Duration> {
            self.own_timeout
        }
    }

    fn sleeper(id: &str, nap_ms: u64, own_ms: Option<u64>) -> Subscriber<u8> {
        Subscriber::new(
            id.to_string(),
            Sleeper {
                nap: Duration::from_millis(nap_ms),
                own_timeout: own_ms.map(Duration::from_millis),
            },
        )
    }

    #[tokio::test]
    async fn panics_are_recorded_and_delivery_continues() {
        let d = NotificationDispatcher::default();
        let subs = vec![
            Subscriber::from_fn("boom", |_: &u8| -> Result<(), DeliveryError> {
                panic!("kaboom")
            }),
            Subscriber::from_fn("ok", |_: &u8| Ok(())),
        ];

        let report = d.deliver("t".into(), &subs, &1).await;
        assert_eq!(report.subscribers(), ["boom", "ok"]);
        assert_eq!(
            report.outcome_of("boom").and_then(DeliveryOutcome::error),
            Some(&DeliveryError::Panicked {
                info: "kaboom".into()
            })
        );
        assert!(report.outcome_of("ok").is_some_and(DeliveryOutcome::is_delivered));
    }

    #[tokio::test(start_paused = true)]
    async fn dispatcher_timeout_applies_unless_overridden() {
        let d = NotificationDispatcher::new(Some(Duration::from_millis(10)), None);
        let subs = vec![
            sleeper("slow", 50, None),
            sleeper("patient", 50, Some(100)),
            sleeper("fast", 1, None),
            sleeper("unbounded", 50, Some(0)),
        ];

        let report = d.deliver("t".into(), &subs, &0).await;
        assert_eq!(
            report.outcome_of("slow").and_then(DeliveryOutcome::error),
            Some(&DeliveryError::TimedOut {
                timeout: Duration::from_millis(10)
            })
        );
        assert!(report.outcome_of("patient").is_some_and(DeliveryOutcome::is_delivered));
        assert!(report.outcome_of("fast").is_some_and(DeliveryOutcome::is_delivered));
        assert!(report.outcome_of("unbounded").is_some_and(DeliveryOutcome::is_delivered));
    }

    #[tokio::test]
    async fn failures_reach_the_bus() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let d = NotificationDispatcher::new(None, Some(bus));
        let subs = vec![Subscriber::new(
            "picky",
            ReceiveFn::new(|v: &u8| {
                if *v > 1 {
                    Err(DeliveryError::failed("too big"))
                } else {
                    Ok(())
                }
            }),
        )];

        let report = d.deliver("numbers".into(), &subs, &7).await;
        assert_eq!(report.failed(), 1);

        let failed = rx.recv().await.unwrap();
        assert_eq!(failed.kind, EventKind::DeliveryFailed);
        assert_eq!(failed.subscriber.as_deref(), Some("picky"));
        assert_eq!(failed.reason.as_deref(), Some("error: too big"));

        let published = rx.recv().await.unwrap();
        assert_eq!(published.kind, EventKind::Published);
        assert_eq!((published.delivered, published.failed), (Some(0), Some(1)));
    }

    #[test]
    fn panic_payloads_are_rendered() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let other: Box<dyn Any + Send> = Box::new(42_u32);
        assert_eq!(panic_message(&*owned), "owned");
        assert_eq!(panic_message(&*other), "unknown panic");
    }
}
