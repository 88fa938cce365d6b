//! # Race-free lazy instance registry.
//!
//! [`InstanceRegistry`] maps string keys to lazily constructed, shared instances.
//! The first caller for a key runs the factory; every concurrent caller waits for
//! that one construction and receives the same `Arc`.
//!
//! ## Architecture
//! ```text
//! get_or_create(key, factory)
//!     │
//!     ├─► [slots lock] look up key ───────────────────────────────┐
//!     │      None            → insert Constructing{ticket}, run   │ one critical
//!     │      Constructing    → clone watch receiver, wait         │ section: check
//!     │      Ready(instance) → return it                          │ and claim
//!     │      Failed(err)     → return it (cache_failures only)    │
//!     │   ────────────────────────────────────────────────────────┘
//!     │
//!     └─► constructor: factory().await (task-local stack marks key)
//!             ├─ Ok  ──► [slots lock] Ready(instance) ──► watch: Some(Ok)
//!             ├─ Err ──► [slots lock] remove / Failed ──► watch: Some(Err)
//!             └─ dropped mid-way ──► [slots lock] remove ──► watch closed → waiters retry
//! ```
//!
//! ## Rules
//! - The existence check and the claim happen under the same lock; no second caller
//!   can start a construction for a key that is already being constructed.
//! - The instance is stored and announced only after the factory returned, so no
//!   caller ever observes a partially built value.
//! - A factory that asks for its own key (directly or through other keys) gets
//!   [`RegistryError::Reentrant`] at once, and the outer construction fails with the
//!   same error.
//! - Failed constructions are forgotten unless `cache_failures` is set.
//!
//! ## Limits
//! Re-entrancy is tracked per tokio task. A factory that spawns a separate task which
//! waits on the same key (or a cycle of keys across tasks) deadlocks instead.

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::events::{Bus, Event, EventKind};

use super::slot::{Instance, Outcome, Slot};

/// Source of registry identities (keeps task-local stacks of distinct registries apart).
static REGISTRY_IDS: AtomicU64 = AtomicU64::new(0);

tokio::task_local! {
    /// Constructions whose factories are running in the current task, outermost first.
    static CONSTRUCTING: Vec<Frame>;
}

/// One running construction, as seen by the task that runs its factory.
#[derive(Clone)]
struct Frame {
    registry: u64,
    key: Arc<str>,
    /// Set when the factory re-enters `key`; read back by the owning construction only.
    reentered: Arc<AtomicBool>,
}

struct Inner {
    id: u64,
    config: RegistryConfig,
    slots: Mutex<HashMap<String, Slot>>,
    tickets: AtomicU64,
    bus: Option<Bus>,
}

/// What a caller must do after looking a key up.
enum Claim {
    Ready(Instance),
    Failed(RegistryError),
    Wait(watch::Receiver<Option<Outcome>>),
    Construct(watch::Sender<Option<Outcome>>, u64),
}

/// Lazy-construction-and-sharing provider for singleton-scoped resources.
///
/// Cheap to clone; clones share the same slots.
///
/// # Example
/// ```rust
/// use std::convert::Infallible;
/// use topicvisor::InstanceRegistry;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let registry = InstanceRegistry::new();
/// let a = registry
///     .get_or_create::<String, _, _, Infallible>("greeting", || async { Ok("hi".to_string()) })
///     .await
///     .unwrap();
/// let b = registry
///     .get_or_create::<String, _, _, Infallible>("greeting", || async { Ok("never".to_string()) })
///     .await
///     .unwrap();
/// assert!(std::sync::Arc::ptr_eq(&a, &b));
/// # }
/// ```
#[derive(Clone)]
pub struct InstanceRegistry {
    inner: Arc<Inner>,
}

impl InstanceRegistry {
    /// Creates an empty registry with default configuration.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates an empty registry with the given configuration.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Returns the instance for `key`, constructing it with `factory` on first demand.
    ///
    /// ### Behavior
    /// - First caller runs `factory` exactly once; concurrent callers wait and receive
    ///   the same instance (or the same error).
    /// - If the constructing caller is dropped mid-construction, a waiter takes over
    ///   with its own factory.
    ///
    /// ### Errors
    /// - [`RegistryError::Construction`]: the factory failed.
    /// - [`RegistryError::Reentrant`]: the factory re-entered `key`.
    /// - [`RegistryError::TypeMismatch`]: `key` holds a value that is not a `V`.
    pub async fn get_or_create<V, F, Fut, E>(
        &self,
        key: &str,
        factory: F,
    ) -> Result<Arc<V>, RegistryError>
    where
        V: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: fmt::Display,
    {
        if let Some(frame) = self.frame_for(key) {
            return Err(self.reentered(key, &frame));
        }

        let (tx, ticket) = loop {
            match self.claim(key) {
                Claim::Ready(instance) => return downcast(key, instance),
                Claim::Failed(err) => return Err(err),
                Claim::Wait(mut done) => {
                    let outcome = match done.wait_for(Option::is_some).await {
                        Ok(outcome) => outcome.clone(),
                        Err(_closed) => None,
                    };
                    match outcome {
                        Some(outcome) => return outcome.and_then(|i| downcast(key, i)),
                        None => {
                            tracing::debug!(key, "construction abandoned; retrying");
                            continue;
                        }
                    }
                }
                Claim::Construct(tx, ticket) => break (tx, ticket),
            }
        };

        let reentered = Arc::new(AtomicBool::new(false));
        let mut guard = ConstructionGuard {
            registry: self,
            key,
            ticket,
            reentered: Arc::clone(&reentered),
            tx: Some(tx),
        };

        let mut stack = CONSTRUCTING.try_with(Clone::clone).unwrap_or_default();
        stack.push(Frame {
            registry: self.inner.id,
            key: Arc::from(key),
            reentered,
        });
        let produced = CONSTRUCTING.scope(stack, factory()).await;

        let outcome = match produced {
            Ok(value) => Ok(Arc::new(value) as Instance),
            Err(err) => Err(RegistryError::Construction {
                key: key.to_owned(),
                error: err.to_string(),
            }),
        };
        guard.finish(outcome).and_then(|i| downcast(key, i))
    }

    /// Returns the constructed instance for `key`, without constructing.
    ///
    /// `Ok(None)` if the key is absent, still under construction, or failed.
    pub fn get<V>(&self, key: &str) -> Result<Option<Arc<V>>, RegistryError>
    where
        V: Send + Sync + 'static,
    {
        let instance = match self.slots().get(key) {
            Some(Slot::Ready(instance)) => Arc::clone(instance),
            _ => return Ok(None),
        };
        downcast(key, instance).map(Some)
    }

    /// True if `key` holds a constructed instance.
    pub fn contains(&self, key: &str) -> bool {
        matches!(self.slots().get(key), Some(Slot::Ready(_)))
    }

    /// Forgets `key` (instance, cached failure or in-flight construction).
    ///
    /// The next `get_or_create` constructs anew. Callers already holding the old
    /// instance keep it; an in-flight construction still completes for its waiters
    /// but is not stored.
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.slots().remove(key).is_some();
        if removed {
            tracing::debug!(key, "registry entry removed");
        }
        removed
    }

    /// Number of constructed instances.
    pub fn len(&self) -> usize {
        self.slots()
            .values()
            .filter(|s| matches!(s, Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of constructed instances, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .slots()
            .iter()
            .filter(|(_, s)| matches!(s, Slot::Ready(_)))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort_unstable();
        keys
    }

    // ---------------------------
    // Helpers
    // ---------------------------

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Check-and-claim in one critical section.
    fn claim(&self, key: &str) -> Claim {
        let mut slots = self.slots();
        match slots.get(key) {
            Some(Slot::Ready(instance)) => Claim::Ready(Arc::clone(instance)),
            Some(Slot::Failed(err)) => Claim::Failed(err.clone()),
            Some(Slot::Constructing { done, .. }) => Claim::Wait(done.clone()),
            None => {
                let ticket = self.inner.tickets.fetch_add(1, Ordering::Relaxed);
                let (tx, done) = watch::channel(None);
                slots.insert(
                    key.to_owned(),
                    Slot::Constructing { ticket, done },
                );
                Claim::Construct(tx, ticket)
            }
        }
    }

    /// The frame of this task's own running construction of `key`, if any.
    fn frame_for(&self, key: &str) -> Option<Frame> {
        CONSTRUCTING
            .try_with(|stack| {
                stack
                    .iter()
                    .find(|f| f.registry == self.inner.id && &*f.key == key)
                    .cloned()
            })
            .ok()
            .flatten()
    }

    /// Flags this task's construction of `key` and builds the error for the inner call.
    ///
    /// The shared slot is not touched: after a `remove`, it may belong to another caller.
    fn reentered(&self, key: &str, frame: &Frame) -> RegistryError {
        frame.reentered.store(true, Ordering::SeqCst);
        let err = RegistryError::Reentrant {
            key: key.to_owned(),
        };
        tracing::warn!(key, label = err.as_label(), "re-entrant construction");
        self.emit_failure(key, &err);
        err
    }

    /// Stores the outcome of construction `ticket` (if the slot is still ours).
    fn install(&self, key: &str, ticket: u64, reentered: bool, outcome: Outcome) -> Outcome {
        let mut slots = self.slots();
        let outcome = if reentered {
            Err(RegistryError::Reentrant {
                key: key.to_owned(),
            })
        } else {
            outcome
        };

        if slots.get(key).is_some_and(|s| s.is_ticket(ticket)) {
            match &outcome {
                Ok(instance) => {
                    slots.insert(key.to_owned(), Slot::Ready(Arc::clone(instance)));
                }
                Err(err) if self.inner.config.cache_failures && !err.is_fatal() => {
                    slots.insert(key.to_owned(), Slot::Failed(err.clone()));
                }
                Err(_) => {
                    slots.remove(key);
                }
            }
        } else {
            tracing::debug!(key, "entry removed during construction; result not stored");
        }
        drop(slots);

        match &outcome {
            Ok(_) => {
                tracing::debug!(key, "instance created");
                if let Some(bus) = &self.inner.bus {
                    bus.publish(Event::new(EventKind::InstanceCreated).with_key(key));
                }
            }
            Err(err) if !reentered => {
                tracing::warn!(key, error = %err, label = err.as_label(), "construction failed");
                self.emit_failure(key, err);
            }
            Err(_) => {}
        }
        outcome
    }

    /// Releases the slot of an abandoned construction.
    fn abandon(&self, key: &str, ticket: u64) {
        let mut slots = self.slots();
        if slots.get(key).is_some_and(|s| s.is_ticket(ticket)) {
            slots.remove(key);
        }
        drop(slots);
        tracing::debug!(key, "construction abandoned");
    }

    fn emit_failure(&self, key: &str, err: &RegistryError) {
        if let Some(bus) = &self.inner.bus {
            bus.publish(
                Event::new(EventKind::ConstructionFailed)
                    .with_key(key)
                    .with_reason(err.as_message()),
            );
        }
    }
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceRegistry")
            .field("id", &self.inner.id)
            .field("config", &self.inner.config)
            .field("len", &self.len())
            .finish()
    }
}

/// Builder for [`InstanceRegistry`].
#[derive(Default)]
pub struct RegistryBuilder {
    config: RegistryConfig,
    bus: Option<Bus>,
}

impl RegistryBuilder {
    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    /// Remember failed constructions until the key is removed.
    pub fn cache_failures(mut self, cache: bool) -> Self {
        self.config.cache_failures = cache;
        self
    }

    /// Publishes construction events on `bus`.
    pub fn bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn build(self) -> InstanceRegistry {
        InstanceRegistry {
            inner: Arc::new(Inner {
                id: REGISTRY_IDS.fetch_add(1, Ordering::Relaxed),
                config: self.config,
                slots: Mutex::new(HashMap::new()),
                tickets: AtomicU64::new(0),
                bus: self.bus,
            }),
        }
    }
}

/// Owns the sender of one construction; releases the slot if dropped unfinished.
struct ConstructionGuard<'a> {
    registry: &'a InstanceRegistry,
    key: &'a str,
    ticket: u64,
    reentered: Arc<AtomicBool>,
    tx: Option<watch::Sender<Option<Outcome>>>,
}

impl ConstructionGuard<'_> {
    /// Stores the outcome, then wakes every waiter with it.
    fn finish(&mut self, outcome: Outcome) -> Outcome {
        let reentered = self.reentered.load(Ordering::SeqCst);
        let outcome = self
            .registry
            .install(self.key, self.ticket, reentered, outcome);
        if let Some(tx) = self.tx.take() {
            tx.send_replace(Some(outcome.clone()));
        }
        outcome
    }
}

impl Drop for ConstructionGuard<'_> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            // Slot first: woken waiters must not find the dead construction again.
            self.registry.abandon(self.key, self.ticket);
            drop(tx);
        }
    }
}

fn downcast<V>(key: &str, instance: Instance) -> Result<Arc<V>, RegistryError>
where
    V: Send + Sync + 'static,
{
    instance
        .downcast::<V>()
        .map_err(|_| RegistryError::TypeMismatch {
            key: key.to_owned(),
            expected: type_name::<V>(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use tokio::sync::{Barrier, oneshot};

    #[derive(Debug)]
    struct Resource {
        serial: usize,
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn fifty_concurrent_callers_construct_once() {
        let registry = InstanceRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(50));

        let mut joins = Vec::new();
        for _ in 0..50 {
            let registry = registry.clone();
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            joins.push(tokio::spawn(async move {
                barrier.wait().await;
                registry
                    .get_or_create::<Resource, _, _, Infallible>("X", || async move {
                        let serial = calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(Resource { serial })
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut instances = Vec::new();
        for j in joins {
            instances.push(j.await.unwrap());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(instances[0].serial, 0);
        assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn failed_construction_is_retried_by_default() {
        let registry = InstanceRegistry::new();

        let err = registry
            .get_or_create::<u32, _, _, _>("db", || async { Err::<u32, _>("refused") })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::Construction {
                key: "db".into(),
                error: "refused".into()
            }
        );
        assert!(!registry.contains("db"));

        let ok = registry
            .get_or_create::<u32, _, _, Infallible>("db", || async { Ok(5) })
            .await
            .unwrap();
        assert_eq!(*ok, 5);
    }

    #[tokio::test]
    async fn cached_failure_sticks_until_removed() {
        let registry = InstanceRegistry::builder().cache_failures(true).build();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            let err = registry
                .get_or_create::<u32, _, _, _>("db", || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, _>("refused")
                })
                .await
                .unwrap_err();
            assert_eq!(err.as_label(), "registry_construction_failed");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(registry.remove("db"));
        let ok = registry
            .get_or_create::<u32, _, _, Infallible>("db", || async { Ok(1) })
            .await
            .unwrap();
        assert_eq!(*ok, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn waiters_receive_the_same_failure() {
        let registry = InstanceRegistry::new();
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let first = {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .get_or_create::<u32, _, _, _>("k", || async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Err::<u32, _>("boom")
                    })
                    .await
            })
        };
        started_rx.await.unwrap();

        let waiter_calls = Arc::new(AtomicUsize::new(0));
        let second = {
            let registry = registry.clone();
            let waiter_calls = Arc::clone(&waiter_calls);
            tokio::spawn(async move {
                registry
                    .get_or_create::<u32, _, _, Infallible>("k", || async move {
                        waiter_calls.fetch_add(1, Ordering::SeqCst);
                        Ok(0)
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        release_tx.send(()).unwrap();

        let a = first.await.unwrap().unwrap_err();
        let b = second.await.unwrap().unwrap_err();
        assert_eq!(a, b);
        assert_eq!(waiter_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn self_reentry_is_reported_distinctly() {
        let registry = InstanceRegistry::new();
        let inner = registry.clone();

        let err = registry
            .get_or_create::<u32, _, _, Infallible>("a", move || async move {
                let nested = inner
                    .get_or_create::<u32, _, _, Infallible>("a", || async { Ok(1) })
                    .await;
                assert_eq!(
                    nested.unwrap_err(),
                    RegistryError::Reentrant { key: "a".into() }
                );
                Ok(2)
            })
            .await
            .unwrap_err();

        assert_eq!(err, RegistryError::Reentrant { key: "a".into() });
        assert!(err.is_fatal());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn cycle_through_other_key_is_reentrant() {
        let registry = InstanceRegistry::new();
        let r1 = registry.clone();

        let res = registry
            .get_or_create::<u32, _, _, RegistryError>("a", move || async move {
                let r2 = r1.clone();
                let b = r1
                    .get_or_create::<u32, _, _, RegistryError>("b", move || async move {
                        let a = r2
                            .get_or_create::<u32, _, _, Infallible>("a", || async { Ok(0) })
                            .await?;
                        Ok::<u32, RegistryError>(*a + 1)
                    })
                    .await?;
                Ok::<u32, RegistryError>(*b + 1)
            })
            .await;

        assert_eq!(res.unwrap_err(), RegistryError::Reentrant { key: "a".into() });
        assert!(registry.keys().is_empty());
    }

    #[tokio::test]
    async fn same_key_in_another_registry_is_not_reentrant() {
        let outer = InstanceRegistry::new();
        let other = InstanceRegistry::new();

        let v = outer
            .get_or_create::<u32, _, _, RegistryError>("a", move || async move {
                let n = other
                    .get_or_create::<u32, _, _, Infallible>("a", || async { Ok(20) })
                    .await?;
                Ok::<u32, RegistryError>(*n + 1)
            })
            .await
            .unwrap();
        assert_eq!(*v, 21);
    }

    #[tokio::test]
    async fn type_mismatch_is_reported() {
        let registry = InstanceRegistry::new();
        registry
            .get_or_create::<String, _, _, Infallible>("cfg", || async { Ok("x".to_string()) })
            .await
            .unwrap();

        let err = registry
            .get_or_create::<u32, _, _, Infallible>("cfg", || async { Ok(1) })
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::TypeMismatch { expected: "u32", .. }));
        assert!(registry.get::<u32>("cfg").is_err());
        assert_eq!(
            registry.get::<String>("cfg").unwrap().as_deref().map(String::as_str),
            Some("x")
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn abandoned_construction_is_taken_over() {
        let registry = InstanceRegistry::new();
        let (started_tx, started_rx) = oneshot::channel::<()>();

        let stuck = {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .get_or_create::<u32, _, _, Infallible>("k", || async move {
                        let _ = started_tx.send(());
                        std::future::pending::<()>().await;
                        Ok(1)
                    })
                    .await
            })
        };
        started_rx.await.unwrap();

        let waiter = {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .get_or_create::<u32, _, _, Infallible>("k", || async { Ok(2) })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        stuck.abort();

        assert_eq!(*waiter.await.unwrap().unwrap(), 2);
        assert!(stuck.await.unwrap_err().is_cancelled());
        assert_eq!(registry.keys(), ["k"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn removed_construction_still_reaches_its_waiters() {
        let registry = InstanceRegistry::new();
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let constructor = {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .get_or_create::<u32, _, _, Infallible>("k", || async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok(1)
                    })
                    .await
            })
        };
        started_rx.await.unwrap();

        let waiter = {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .get_or_create::<u32, _, _, Infallible>("k", || async { Ok(2) })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(registry.remove("k"));
        release_tx.send(()).unwrap();

        let built = constructor.await.unwrap().unwrap();
        let waited = waiter.await.unwrap().unwrap();
        assert_eq!(*built, 1);
        assert!(Arc::ptr_eq(&built, &waited));
        assert!(!registry.contains("k"));
        assert!(registry.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn reentry_after_remove_fails_only_the_reentering_construction() {
        let registry = InstanceRegistry::new();
        let (first_started_tx, first_started_rx) = oneshot::channel::<()>();
        let (first_go_tx, first_go_rx) = oneshot::channel::<()>();
        let (second_started_tx, second_started_rx) = oneshot::channel::<()>();
        let (second_go_tx, second_go_rx) = oneshot::channel::<()>();

        let first = {
            let registry = registry.clone();
            let inner = registry.clone();
            tokio::spawn(async move {
                registry
                    .get_or_create::<u32, _, _, Infallible>("k", move || async move {
                        let _ = first_started_tx.send(());
                        let _ = first_go_rx.await;
                        let nested = inner
                            .get_or_create::<u32, _, _, Infallible>("k", || async { Ok(0) })
                            .await;
                        assert_eq!(
                            nested.unwrap_err(),
                            RegistryError::Reentrant { key: "k".into() }
                        );
                        Ok(1)
                    })
                    .await
            })
        };
        first_started_rx.await.unwrap();
        assert!(registry.remove("k"));

        let second = {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .get_or_create::<u32, _, _, Infallible>("k", || async move {
                        let _ = second_started_tx.send(());
                        let _ = second_go_rx.await;
                        Ok(2)
                    })
                    .await
            })
        };
        second_started_rx.await.unwrap();

        first_go_tx.send(()).unwrap();
        let first = first.await.unwrap();
        assert_eq!(first.unwrap_err(), RegistryError::Reentrant { key: "k".into() });

        second_go_tx.send(()).unwrap();
        assert_eq!(*second.await.unwrap().unwrap(), 2);
        assert_eq!(registry.get::<u32>("k").unwrap().as_deref(), Some(&2));
    }

    #[tokio::test]
    async fn remove_forgets_instances() {
        let registry = InstanceRegistry::new();
        let first = registry
            .get_or_create::<u32, _, _, Infallible>("n", || async { Ok(1) })
            .await
            .unwrap();
        assert!(registry.contains("n"));
        assert!(registry.remove("n"));
        assert!(!registry.remove("n"));
        assert_eq!(registry.get::<u32>("n").unwrap(), None);

        let second = registry
            .get_or_create::<u32, _, _, Infallible>("n", || async { Ok(2) })
            .await
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(*first, 1);
    }

    #[tokio::test]
    async fn construction_events_reach_the_bus() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let registry = InstanceRegistry::builder().bus(bus).build();

        registry
            .get_or_create::<u8, _, _, Infallible>("ok", || async { Ok(1) })
            .await
            .unwrap();
        let _ = registry
            .get_or_create::<u8, _, _, _>("bad", || async { Err::<u8, _>("nope") })
            .await;

        let created = rx.recv().await.unwrap();
        assert_eq!(created.kind, EventKind::InstanceCreated);
        assert_eq!(created.key.as_deref(), Some("ok"));

        let failed = rx.recv().await.unwrap();
        assert_eq!(failed.kind, EventKind::ConstructionFailed);
        assert_eq!(failed.key.as_deref(), Some("bad"));
    }
}
