//! Topics: registration, publish and delivery reporting.
//!
//! ## Contents
//! - [`Topic`], [`TopicBuilder`] the per-name subscriber registry
//! - [`NotificationDispatcher`] snapshot-then-dispatch delivery with per-subscriber isolation
//! - [`DeliveryReport`], [`Delivery`], [`DeliveryOutcome`] the result of one publish
//! - [`Hub`] lazily created, name-addressed topics backed by an `InstanceRegistry`
//!
//! ## Publish path
//! ```text
//! Topic::publish(payload)
//!     └─► NotificationDispatcher::dispatch(topic, Arc<payload>)
//!             ├─► Topic::snapshot_for()     (topic lock, copy registrations)
//!             └─► deliver(snapshot)         (no lock, in order, isolated)
//!                     └─► DeliveryReport
//! ```

mod dispatcher;
mod hub;
mod report;
#[allow(clippy::module_inception)]
mod topic;

pub use dispatcher::NotificationDispatcher;
pub use hub::Hub;
pub use report::{Delivery, DeliveryOutcome, DeliveryReport};
pub use topic::{Topic, TopicBuilder};

pub(crate) use topic::TopicShared;
