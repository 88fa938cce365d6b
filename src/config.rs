//! # Topic and registry configuration.
//!
//! Provides [`TopicConfig`] and [`RegistryConfig`].
//!
//! ## Sentinel values
//! - `delivery_timeout = 0s` → no per-subscriber timeout

use std::time::Duration;

/// Per-topic settings.
///
/// ## Field semantics
/// - `retain_last`: keep the last published payload and hand it to late joiners
/// - `delivery_timeout`: default per-subscriber timeout (`0s` = none)
#[derive(Clone, Debug, Default)]
pub struct TopicConfig {
    /// Keep the most recent payload.
    ///
    /// When set, a subscriber registered after a publish receives the retained
    /// payload once, right after it joins.
    pub retain_last: bool,

    /// Default timeout applied to each `on_payload` call.
    ///
    /// - `Duration::ZERO` = no timeout (a slow subscriber delays the rest of the publish)
    /// - `> 0` = the call is abandoned and recorded as `DeliveryError::TimedOut`
    ///
    /// A subscriber may override it via [`Receive::timeout`](crate::Receive::timeout).
    pub delivery_timeout: Duration,
}

impl TopicConfig {
    /// Returns the delivery timeout as an `Option`.
    ///
    /// - `None` → no timeout
    /// - `Some(d)` → timeout applied per subscriber call
    #[inline]
    pub fn timeout(&self) -> Option<Duration> {
        if self.delivery_timeout == Duration::ZERO {
            None
        } else {
            Some(self.delivery_timeout)
        }
    }

    /// Enables payload retention.
    #[must_use]
    pub fn retaining(mut self) -> Self {
        self.retain_last = true;
        self
    }

    /// Sets the default delivery timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }
}

/// Instance registry settings.
#[derive(Clone, Debug, Default)]
pub struct RegistryConfig {
    /// Remember a failed construction.
    ///
    /// - `false` (default): the next caller retries the factory
    /// - `true`: the error is returned to every later caller until the key is removed
    pub cache_failures: bool,
}
