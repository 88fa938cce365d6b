//! # Example: singleton
//!
//! Fifty tasks race for the same lazily constructed resource.
//!
//! Shows how to:
//! - Share one [`InstanceRegistry`] between tasks.
//! - Observe that the factory runs once and every task gets the same `Arc`.
//! - Look up topics by name through a [`Hub`] built on the same registry.
//!
//! ## Run
//! ```bash
//! RUST_LOG=topicvisor=debug cargo run --example singleton
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Context;
use topicvisor::{Hub, InstanceRegistry, Subscriber, TopicConfig};
use tracing_subscriber::EnvFilter;

/// Stand-in for an expensive resource (connection pool, parsed config, ...).
#[derive(Debug)]
struct Pool {
    dsn: String,
}

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let registry = InstanceRegistry::new();
    let constructed = Arc::new(AtomicUsize::new(0));

    let mut joins = Vec::with_capacity(50);
    for worker in 0..50 {
        let registry = registry.clone();
        let constructed = Arc::clone(&constructed);
        joins.push(tokio::spawn(async move {
            registry
                .get_or_create::<Pool, _, _, std::io::Error>("pool", || async move {
                    constructed.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(Pool {
                        dsn: format!("postgres://db/app?first={worker}"),
                    })
                })
                .await
        }));
    }

    let mut pools = Vec::with_capacity(joins.len());
    for j in joins {
        pools.push(j.await?.context("pool construction")?);
    }
    let first = &pools[0];
    let shared = pools.iter().all(|p| Arc::ptr_eq(p, first));
    println!(
        "factory ran {} time(s); all 50 share one instance: {shared}; dsn={}",
        constructed.load(Ordering::SeqCst),
        first.dsn
    );

    let hub: Hub<String> =
        Hub::with_registry(registry.clone(), TopicConfig::default().retaining());
    let alerts = hub.topic("alerts").await?;
    alerts.publish("disk almost full".to_string()).await;
    alerts
        .subscribe(&Subscriber::from_fn("oncall", |msg: &String| {
            println!("oncall replay: {msg}");
            Ok(())
        }))
        .await;

    println!("registry keys: {:?}", registry.keys());
    Ok(())
}
