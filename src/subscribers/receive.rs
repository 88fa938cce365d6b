//! # Receive capability
//!
//! `Receive` is the extension point for plugging payload handlers into a
//! [`Topic`](crate::Topic). It carries the callback only; identity and topic
//! membership live in the [`Subscriber`](crate::Subscriber) handle that wraps it.
//!
//! ## Contract
//! - Called by the dispatcher in publish order, one subscriber at a time.
//! - No topic lock is held during the call: implementations may subscribe or
//!   unsubscribe (themselves included) on any topic.
//! - Returning an error (or panicking) is recorded in the publish report and does
//!   not stop delivery to the remaining subscribers.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use topicvisor::{DeliveryError, Receive};
//!
//! struct Audit;
//!
//! #[async_trait]
//! impl Receive<String> for Audit {
//!     async fn on_payload(&self, payload: &String) -> Result<(), DeliveryError> {
//!         if payload.is_empty() {
//!             return Err(DeliveryError::failed("empty payload"));
//!         }
//!         // write audit record...
//!         Ok(())
//!     }
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;

use crate::error::DeliveryError;

/// Contract for payload receivers.
///
/// Implementations should avoid blocking the async runtime: a slow receiver
/// delays every subscriber after it in the same publish unless a timeout applies.
#[async_trait]
pub trait Receive<T>: Send + Sync + 'static {
    /// Handles one published payload.
    ///
    /// The payload is shared by all subscribers of the publish; it is never copied
    /// or transformed by the topic.
    async fn on_payload(&self, payload: &T) -> Result<(), DeliveryError>;

    /// Per-subscriber delivery timeout.
    ///
    /// `None` (default) falls back to the topic's
    /// [`TopicConfig::delivery_timeout`](crate::TopicConfig::delivery_timeout).
    /// `Some(Duration::ZERO)` disables the timeout for this receiver.
    fn timeout(&self) -> Option<Duration> {
        None
    }
}
