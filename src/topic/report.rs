//! # Delivery report
//!
//! [`DeliveryReport`] is the result of one publish: one [`Delivery`] per subscriber of
//! the snapshot, in delivery order.

use std::slice;
use std::sync::Arc;

use crate::error::DeliveryError;

/// Outcome of delivering one payload to one subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// `on_payload` returned `Ok(())`.
    Delivered,
    /// `on_payload` failed, timed out or panicked.
    Failed(DeliveryError),
}

impl DeliveryOutcome {
    #[inline]
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }

    /// The failure detail, if any.
    #[inline]
    pub fn error(&self) -> Option<&DeliveryError> {
        match self {
            DeliveryOutcome::Delivered => None,
            DeliveryOutcome::Failed(err) => Some(err),
        }
    }
}

impl From<Result<(), DeliveryError>> for DeliveryOutcome {
    fn from(res: Result<(), DeliveryError>) -> Self {
        match res {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(err) => DeliveryOutcome::Failed(err),
        }
    }
}

/// One `(subscriber id, outcome)` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Subscriber id.
    pub subscriber: Arc<str>,
    /// What happened.
    pub outcome: DeliveryOutcome,
}

/// Ordered outcome record for one publish call.
///
/// A publish never fails because subscribers failed; inspect the report instead.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    topic: Arc<str>,
    entries: Vec<Delivery>,
    closed: bool,
}

impl DeliveryReport {
    pub(crate) fn with_capacity(topic: Arc<str>, capacity: usize) -> Self {
        Self {
            topic,
            entries: Vec::with_capacity(capacity),
            closed: false,
        }
    }

    /// Report for a publish on a torn-down topic (no deliveries).
    pub(crate) fn closed(topic: Arc<str>) -> Self {
        Self {
            topic,
            entries: Vec::new(),
            closed: true,
        }
    }

    pub(crate) fn push(&mut self, subscriber: Arc<str>, outcome: DeliveryOutcome) {
        self.entries.push(Delivery {
            subscriber,
            outcome,
        });
    }

    /// Name of the topic that was published to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// All entries in delivery order.
    pub fn entries(&self) -> &[Delivery] {
        &self.entries
    }

    pub fn iter(&self) -> slice::Iter<'_, Delivery> {
        self.entries.iter()
    }

    /// Number of subscribers in the snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if the topic was already torn down when publish was called.
    pub fn was_closed(&self) -> bool {
        self.closed
    }

    /// Count of successful deliveries.
    pub fn delivered(&self) -> usize {
        self.entries
            .iter()
            .filter(|d| d.outcome.is_delivered())
            .count()
    }

    /// Count of failed deliveries.
    pub fn failed(&self) -> usize {
        self.len() - self.delivered()
    }

    /// True if every subscriber of the snapshot received the payload.
    pub fn is_success(&self) -> bool {
        self.entries.iter().all(|d| d.outcome.is_delivered())
    }

    /// Failed entries with their zero-based position in delivery order.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &Delivery)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, d)| !d.outcome.is_delivered())
    }

    /// Subscriber ids in delivery order.
    pub fn subscribers(&self) -> Vec<&str> {
        self.entries.iter().map(|d| &*d.subscriber).collect()
    }

    /// Outcome for a given subscriber id.
    pub fn outcome_of(&self, id: &str) -> Option<&DeliveryOutcome> {
        self.entries
            .iter()
            .find(|d| &*d.subscriber == id)
            .map(|d| &d.outcome)
    }
}

impl<'a> IntoIterator for &'a DeliveryReport {
    type Item = &'a Delivery;
    type IntoIter = slice::Iter<'a, Delivery>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_positions() {
        let mut report = DeliveryReport::with_capacity("t".into(), 3);
        report.push("a".into(), DeliveryOutcome::Delivered);
        report.push("b".into(), Err::<(), _>(DeliveryError::failed("x")).into());
        report.push("c".into(), Ok::<(), DeliveryError>(()).into());

        assert_eq!(report.len(), 3);
        assert_eq!(report.delivered(), 2);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_success());
        assert_eq!(report.subscribers(), ["a", "b", "c"]);

        let failures: Vec<_> = report.failures().map(|(i, d)| (i, &*d.subscriber)).collect();
        assert_eq!(failures, [(1, "b")]);
        assert_eq!(
            report.outcome_of("b").and_then(DeliveryOutcome::error),
            Some(&DeliveryError::failed("x"))
        );
        assert!(report.outcome_of("zzz").is_none());
    }

    #[test]
    fn closed_report_is_empty() {
        let report = DeliveryReport::closed("gone".into());
        assert!(report.was_closed());
        assert!(report.is_empty());
        assert!(report.is_success());
        assert_eq!(report.topic(), "gone");
    }
}
