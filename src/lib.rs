//! # topicvisor
//!
//! **Topicvisor** is an in-process publish/subscribe core for async Rust.
//!
//! Named topics keep ordered, duplicate-free subscriber lists and deliver every
//! published payload to a snapshot of those subscribers. A race-free
//! [`InstanceRegistry`] constructs shared resources (topics included) exactly once,
//! no matter how many tasks ask for them at the same time.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   publisher task            publisher task
//!        │                         │
//!        ▼                         ▼
//! ┌──────────────────────────────────────────────┐
//! │  Topic<T> ("orders")                         │
//! │  - registrations (ordered, unique by id)     │
//! │  - last payload (optional, retain_last)      │
//! │  - close token (teardown)                    │
//! └──────────────┬───────────────────────────────┘
//!                │ snapshot under lock
//!                ▼
//! ┌──────────────────────────────────────────────┐
//! │  NotificationDispatcher                      │
//! │  - delivers in registration order, no lock   │
//! │  - timeout / error / panic isolation         │
//! └──────┬─────────────┬─────────────┬───────────┘
//!        ▼             ▼             ▼
//!   Subscriber A   Subscriber B   Subscriber C     ──► DeliveryReport
//!   (Receive)      (ReceiveFn)    (LogWriter)
//!
//!        membership events, failures ──► Bus (optional, broadcast)
//! ```
//!
//! ### Lazy instances
//! ```text
//! Hub::topic("orders") ──► InstanceRegistry::get_or_create("orders", factory)
//!                              ├─ absent        → this caller constructs
//!                              ├─ constructing  → wait for the same result
//!                              └─ ready         → shared Arc
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                          |
//! |-------------------|----------------------------------------------------------|---------------------------------------------|
//! | **Topics**        | Subscribe, unsubscribe, publish, teardown.               | [`Topic`], [`TopicBuilder`], [`Hub`]        |
//! | **Subscribers**   | Receive capability separate from membership handle.      | [`Receive`], [`ReceiveFn`], [`Subscriber`]  |
//! | **Delivery**      | Per-publish outcome for every subscriber.                | [`DeliveryReport`], [`DeliveryOutcome`]     |
//! | **Registry**      | Single-flight lazy construction of shared instances.     | [`InstanceRegistry`]                        |
//! | **Events**        | Optional broadcast stream of what happened.              | [`Bus`], [`Event`], [`EventKind`]           |
//! | **Errors**        | Typed errors for delivery and construction.              | [`DeliveryError`], [`RegistryError`]        |
//! | **Configuration** | Per-topic and per-registry settings.                     | [`TopicConfig`], [`RegistryConfig`]         |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] receiver _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use topicvisor::{Subscriber, Topic};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let topic: Topic<String> = Topic::new("greetings");
//!
//!     let alice = Subscriber::from_fn("alice", |msg: &String| {
//!         println!("alice got {msg}");
//!         Ok(())
//!     });
//!     topic.subscribe(&alice).await;
//!     topic.subscribe(&alice).await; // no-op
//!
//!     let report = topic.publish("hello".to_string()).await;
//!     assert_eq!(report.delivered(), 1);
//!
//!     topic.unsubscribe("alice").await;
//!     assert!(topic.publish("world".to_string()).await.is_empty());
//! }
//! ```
mod config;
mod error;
mod events;
mod registry;
mod subscribers;
mod topic;

// ---- Public re-exports ----

pub use config::{RegistryConfig, TopicConfig};
pub use error::{DeliveryError, RegistryError};
pub use events::{Bus, Event, EventKind};
pub use registry::{InstanceRegistry, RegistryBuilder};
pub use subscribers::{Receive, ReceiveFn, Subscriber};
pub use topic::{
    Delivery, DeliveryOutcome, DeliveryReport, Hub, NotificationDispatcher, Topic, TopicBuilder,
};

// Optional: expose a simple built-in logging receiver (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
