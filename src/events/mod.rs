//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! observe topics and instance registries from the outside.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Topic` (membership, teardown), `NotificationDispatcher`
//!   (publish outcome, failures, panics), `InstanceRegistry` (construction outcome).
//! - **Consumers**: whoever calls [`Bus::subscribe`]; the crate itself never reads the bus.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
