//! Error types used by topics, subscribers and the instance registry.
//!
//! This module defines two main error enums:
//!
//! - [`RegistryError`]: errors raised while lazily constructing shared instances.
//! - [`DeliveryError`]: errors raised by a single subscriber while receiving a payload.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//!
//! ## Propagation
//! - Registry errors propagate to the caller of
//!   [`InstanceRegistry::get_or_create`](crate::InstanceRegistry::get_or_create) and to every
//!   caller that was waiting on the same construction.
//! - Delivery errors never escape [`Topic::publish`](crate::Topic::publish); they are recorded
//!   per subscriber in the [`DeliveryReport`](crate::DeliveryReport).

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the instance registry.
///
/// `Clone` so a single failed construction can be handed to every waiter.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The factory returned an error during construction.
    #[error("construction of {key:?} failed: {error}")]
    Construction {
        /// Registry key whose construction failed.
        key: String,
        /// The factory's error message.
        error: String,
    },

    /// The factory tried to construct its own key again (cyclic construction).
    #[error("re-entrant construction of {key:?}")]
    Reentrant {
        /// Registry key that was re-entered.
        key: String,
    },

    /// The key holds an instance of a different type than requested.
    #[error("instance {key:?} is not a {expected}")]
    TypeMismatch {
        /// Registry key.
        key: String,
        /// Requested type name.
        expected: &'static str,
    },
}

impl RegistryError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use topicvisor::RegistryError;
    ///
    /// let err = RegistryError::Reentrant { key: "db".into() };
    /// assert_eq!(err.as_label(), "registry_reentrant");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::Construction { .. } => "registry_construction_failed",
            RegistryError::Reentrant { .. } => "registry_reentrant",
            RegistryError::TypeMismatch { .. } => "registry_type_mismatch",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RegistryError::Construction { key, error } => format!("key={key} error: {error}"),
            RegistryError::Reentrant { key } => format!("key={key} constructed re-entrantly"),
            RegistryError::TypeMismatch { key, expected } => {
                format!("key={key} expected type {expected}")
            }
        }
    }

    /// Key the error refers to.
    pub fn key(&self) -> &str {
        match self {
            RegistryError::Construction { key, .. }
            | RegistryError::Reentrant { key }
            | RegistryError::TypeMismatch { key, .. } => key,
        }
    }

    /// True for cyclic construction, which is never retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RegistryError::Reentrant { .. })
    }
}

/// # Errors produced while delivering a payload to one subscriber.
///
/// Subscribers return [`DeliveryError::Failed`] themselves; the dispatcher produces
/// [`DeliveryError::TimedOut`] and [`DeliveryError::Panicked`].
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The subscriber rejected or failed to process the payload.
    #[error("delivery failed: {reason}")]
    Failed {
        /// Subscriber-defined failure message.
        reason: String,
    },

    /// The subscriber did not finish within its delivery timeout.
    #[error("timed out after {timeout:?}")]
    TimedOut {
        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// The subscriber panicked while receiving.
    #[error("subscriber panicked: {info}")]
    Panicked {
        /// Panic message, if one could be extracted.
        info: String,
    },
}

impl DeliveryError {
    /// Shorthand for [`DeliveryError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        DeliveryError::Failed {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use topicvisor::DeliveryError;
    ///
    /// assert_eq!(DeliveryError::failed("boom").as_label(), "delivery_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            DeliveryError::Failed { .. } => "delivery_failed",
            DeliveryError::TimedOut { .. } => "delivery_timeout",
            DeliveryError::Panicked { .. } => "delivery_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            DeliveryError::Failed { reason } => format!("error: {reason}"),
            DeliveryError::TimedOut { timeout } => format!("timeout: {timeout:?}"),
            DeliveryError::Panicked { info } => format!("panic: {info}"),
        }
    }
}
