//! # Hub: process-wide topic directory.
//!
//! [`Hub`] hands out [`Topic`]s by name. Topics are created lazily through an
//! [`InstanceRegistry`], so concurrent first access to a name yields one topic.
//!
//! ```text
//! Hub::topic("orders") ──► InstanceRegistry::get_or_create("orders", || Topic::builder(..).build())
//!                                         │
//!                              first caller constructs, the rest wait
//! ```

use std::convert::Infallible;
use std::fmt;
use std::marker::PhantomData;

use crate::config::TopicConfig;
use crate::error::RegistryError;
use crate::events::Bus;
use crate::registry::InstanceRegistry;
use crate::topic::Topic;

/// Directory of topics sharing one payload type.
pub struct Hub<T> {
    registry: InstanceRegistry,
    config: TopicConfig,
    bus: Option<Bus>,
    _payload: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Hub<T> {
    /// Creates a hub whose topics use `config`.
    pub fn new(config: TopicConfig) -> Self {
        Self::with_registry(InstanceRegistry::new(), config)
    }

    /// Creates a hub on top of an existing registry.
    ///
    /// Topic names share the registry's key space with whatever else lives there.
    pub fn with_registry(registry: InstanceRegistry, config: TopicConfig) -> Self {
        Self {
            registry,
            config,
            bus: None,
            _payload: PhantomData,
        }
    }

    /// Attaches an event bus to every topic created from now on.
    #[must_use]
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Returns the topic called `name`, creating it on first use.
    ///
    /// Fails only if `name` is held by a non-topic value in a shared registry
    /// (`TypeMismatch`) or if called from inside that same construction (`Reentrant`).
    pub async fn topic(&self, name: &str) -> Result<Topic<T>, RegistryError> {
        let config = self.config.clone();
        let bus = self.bus.clone();
        let owned = name.to_owned();

        let topic = self
            .registry
            .get_or_create::<Topic<T>, _, _, Infallible>(name, move || async move {
                let topic = Topic::builder(owned).config(config).maybe_bus(bus).build();
                Ok::<_, Infallible>(topic)
            })
            .await?;
        Ok(Topic::clone(&topic))
    }

    /// Returns the topic called `name` if it exists, without creating it.
    ///
    /// Fails with `TypeMismatch` if `name` holds a non-topic value in a shared registry.
    pub fn get(&self, name: &str) -> Result<Option<Topic<T>>, RegistryError> {
        Ok(self
            .registry
            .get::<Topic<T>>(name)?
            .map(|t| Topic::clone(&t)))
    }

    /// Tears down and forgets the topic called `name`.
    ///
    /// Returns `false` if there was no such topic (a non-topic value under `name` is
    /// left alone). Handles held elsewhere observe the topic as closed.
    pub async fn remove(&self, name: &str) -> bool {
        let Ok(Some(topic)) = self.get(name) else {
            return false;
        };
        self.registry.remove(name);
        topic.teardown().await;
        true
    }

    /// Names of the live topics, sorted.
    pub fn names(&self) -> Vec<String> {
        self.registry.keys()
    }
}

impl<T: Send + Sync + 'static> Default for Hub<T> {
    fn default() -> Self {
        Self::new(TopicConfig::default())
    }
}

impl<T> fmt::Debug for Hub<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::subscribers::Subscriber;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_lookups_share_one_topic() {
        let hub: Arc<Hub<u32>> = Arc::new(Hub::default());
        let mut joins = Vec::new();
        for i in 0..16u32 {
            let hub = Arc::clone(&hub);
            joins.push(tokio::spawn(async move {
                let topic = hub.topic("shared").await.unwrap();
                topic
                    .subscribe(&Subscriber::from_fn(format!("s{i}"), |_: &u32| Ok(())))
                    .await;
            }));
        }
        for j in joins {
            j.await.unwrap();
        }

        let topic = hub.topic("shared").await.unwrap();
        assert_eq!(topic.subscriber_count().await, 16);
        assert_eq!(hub.names(), ["shared"]);
    }

    #[tokio::test]
    async fn remove_tears_down_and_recreates_fresh() {
        let hub: Hub<String> = Hub::new(TopicConfig::default().retaining());
        let old = hub.topic("news").await.unwrap();
        assert!(old.config().retain_last);
        old.subscribe(&Subscriber::from_fn("a", |_: &String| Ok(())))
            .await;

        assert!(hub.remove("news").await);
        assert!(!hub.remove("news").await);
        assert!(old.is_closed());
        assert!(hub.get("news").unwrap().is_none());

        let fresh = hub.topic("news").await.unwrap();
        assert!(!fresh.is_closed());
        assert_eq!(fresh.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn foreign_value_under_topic_name_is_a_type_mismatch() {
        let registry = InstanceRegistry::new();
        registry
            .get_or_create::<u64, _, _, Infallible>("clock", || async { Ok(7) })
            .await
            .unwrap();

        let hub: Hub<u8> = Hub::with_registry(registry, TopicConfig::default());
        let err = hub.topic("clock").await.unwrap_err();
        assert_eq!(err.as_label(), "registry_type_mismatch");

        let err = hub.get("clock").unwrap_err();
        assert_eq!(err.as_label(), "registry_type_mismatch");
        assert!(!hub.remove("clock").await);
        assert!(hub.registry.contains("clock"));
    }
}
