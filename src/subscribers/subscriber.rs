//! # Subscriber handle
//!
//! [`Subscriber`] binds a caller-supplied id to a [`Receive`] capability and keeps
//! track of the topics it joined.
//!
//! ## Ownership
//! ```text
//! Topic ──(strong, owns registration)──► Subscriber ──► Arc<dyn Receive<T>>
//!   ▲                                        │
//!   └──────────(weak back-reference)─────────┘   used only by unsubscribe_all()
//! ```
//!
//! ## Rules
//! - Identity is the id: two handles with the same id are the same logical subscriber,
//!   whatever receiver they wrap.
//! - Cloning a handle shares the receiver and the membership list.
//! - Back-references never keep a topic alive; dead ones are pruned on access.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::error::DeliveryError;
use crate::subscribers::{Receive, ReceiveFn};
use crate::topic::{Topic, TopicShared};

struct SubscriberInner<T> {
    id: Arc<str>,
    receiver: Arc<dyn Receive<T>>,
    /// Topics this subscriber is registered on.
    memberships: Mutex<Vec<Weak<TopicShared<T>>>>,
}

/// A registered receiver of published payloads, identified by id.
pub struct Subscriber<T> {
    inner: Arc<SubscriberInner<T>>,
}

impl<T: Send + Sync + 'static> Subscriber<T> {
    /// Creates a subscriber from an id and a receiver.
    pub fn new(id: impl Into<Arc<str>>, receiver: impl Receive<T>) -> Self {
        Self::from_arc(id, Arc::new(receiver))
    }

    /// Creates a subscriber around an already shared receiver.
    pub fn from_arc(id: impl Into<Arc<str>>, receiver: Arc<dyn Receive<T>>) -> Self {
        Self {
            inner: Arc::new(SubscriberInner {
                id: id.into(),
                receiver,
                memberships: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Creates a subscriber backed by a closure (see [`ReceiveFn`]).
    pub fn from_fn<F>(id: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(&T) -> Result<(), DeliveryError> + Send + Sync + 'static,
    {
        Self::new(id, ReceiveFn::new(f))
    }

    /// Caller-supplied id.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub(crate) fn id_arc(&self) -> Arc<str> {
        Arc::clone(&self.inner.id)
    }

    pub(crate) fn receiver(&self) -> &Arc<dyn Receive<T>> {
        &self.inner.receiver
    }

    /// Invokes the receive capability directly.
    ///
    /// Topics call this through the dispatcher; calling it by hand bypasses
    /// timeout and panic isolation.
    pub async fn receive(&self, payload: &T) -> Result<(), DeliveryError> {
        self.inner.receiver.on_payload(payload).await
    }

    /// Names of the live topics this subscriber is registered on, in join order.
    pub fn topics(&self) -> Vec<Arc<str>> {
        let mut memberships = self.memberships();
        memberships.retain(|w| w.strong_count() > 0);
        memberships
            .iter()
            .filter_map(Weak::upgrade)
            .map(|t| Arc::clone(&t.name))
            .collect()
    }

    /// Unsubscribes from every live topic this subscriber joined.
    ///
    /// Returns the number of topics actually left. Topics are visited in join order;
    /// the membership lock is not held while a topic is being mutated.
    pub async fn unsubscribe_all(&self) -> usize {
        let joined: Vec<Arc<TopicShared<T>>> = {
            let mut memberships = self.memberships();
            memberships.retain(|w| w.strong_count() > 0);
            memberships.iter().filter_map(Weak::upgrade).collect()
        };

        let mut left = 0;
        for shared in joined {
            if Topic::from_shared(shared).unsubscribe(self.id()).await {
                left += 1;
            }
        }
        left
    }

    /// Records a topic. Called by the topic while it holds its write lock.
    pub(crate) fn attach(&self, topic: &Arc<TopicShared<T>>) {
        let mut memberships = self.memberships();
        memberships.retain(|w| w.strong_count() > 0);
        let target = Arc::downgrade(topic);
        if !memberships.iter().any(|w| w.ptr_eq(&target)) {
            memberships.push(target);
        }
    }

    /// Forgets a topic. Called by the topic while it holds its write lock.
    pub(crate) fn detach(&self, topic: &Arc<TopicShared<T>>) {
        let target = Arc::downgrade(topic);
        self.memberships()
            .retain(|w| w.strong_count() > 0 && !w.ptr_eq(&target));
    }

    fn memberships(&self) -> MutexGuard<'_, Vec<Weak<TopicShared<T>>>> {
        self.inner
            .memberships
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for Subscriber<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl<T> Eq for Subscriber<T> {}

impl<T> Hash for Subscriber<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl<T> AsRef<str> for Subscriber<T> {
    fn as_ref(&self) -> &str {
        &self.inner.id
    }
}

impl<T> fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.inner.id)
            .finish_non_exhaustive()
    }
}
