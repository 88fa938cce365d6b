use std::any::Any;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::RegistryError;

/// Type-erased constructed instance.
pub(super) type Instance = Arc<dyn Any + Send + Sync>;

/// Result of one construction, shared with every waiter.
pub(super) type Outcome = Result<Instance, RegistryError>;

/// State of a single registry key.
pub(super) enum Slot {
    /// A caller is running the factory.
    Constructing {
        /// Identifies this construction attempt.
        ticket: u64,
        /// Resolves to `Some(outcome)` when construction ends; closed if abandoned.
        done: watch::Receiver<Option<Outcome>>,
    },

    /// Construction finished; every caller gets this instance.
    Ready(Instance),

    /// Construction failed and failures are cached.
    Failed(RegistryError),
}

impl Slot {
    /// True if this slot belongs to the given construction attempt.
    pub(super) fn is_ticket(&self, ticket: u64) -> bool {
        matches!(self, Slot::Constructing { ticket: t, .. } if *t == ticket)
    }
}
