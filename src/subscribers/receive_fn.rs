//! # Function-backed receiver (`ReceiveFn`)
//!
//! [`ReceiveFn`] wraps a closure `F: Fn(&T) -> Result<(), DeliveryError>`.
//! Shared state must be captured explicitly (`Arc<...>`), the closure itself is `Fn`.
//!
//! ## Example
//! ```rust
//! use topicvisor::{ReceiveFn, Subscriber};
//!
//! let sub = Subscriber::new(
//!     "printer",
//!     ReceiveFn::new(|title: &String| {
//!         println!("new upload: {title}");
//!         Ok(())
//!     }),
//! );
//! assert_eq!(sub.id(), "printer");
//! ```

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::subscribers::Receive;

/// Function-backed receiver implementation.
pub struct ReceiveFn<F> {
    f: F,
    timeout: Option<Duration>,
}

impl<F> ReceiveFn<F> {
    /// Creates a new function-backed receiver.
    pub fn new(f: F) -> Self {
        Self { f, timeout: None }
    }

    /// Overrides the topic's delivery timeout for this receiver.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl<F> fmt::Debug for ReceiveFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiveFn")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<T, F> Receive<T> for ReceiveFn<F>
where
    T: Send + Sync + 'static,
    F: Fn(&T) -> Result<(), DeliveryError> + Send + Sync + 'static, // Fn, not FnMut
{
    async fn on_payload(&self, payload: &T) -> Result<(), DeliveryError> {
        (self.f)(payload)
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}
