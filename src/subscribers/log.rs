//! # LogWriter: simple payload logger
//!
//! A minimal receiver that logs every payload it gets through `tracing`.
//! Use it for tests or demos.
//!
//! ## Example output (with `tracing_subscriber::fmt`)
//! ```text
//! INFO topicvisor: payload received receiver="log-writer" payload="video uploaded"
//! ```

use std::fmt;

use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::subscribers::Receive;

/// Payload writer receiver.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter {
    label: Option<&'static str>,
}

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a writer that tags its records with `label`.
    #[must_use]
    pub fn labeled(label: &'static str) -> Self {
        Self { label: Some(label) }
    }
}

#[async_trait]
impl<T> Receive<T> for LogWriter
where
    T: fmt::Debug + Send + Sync + 'static,
{
    async fn on_payload(&self, payload: &T) -> Result<(), DeliveryError> {
        tracing::info!(
            receiver = self.label.unwrap_or("log-writer"),
            payload = ?payload,
            "payload received"
        );
        Ok(())
    }
}
