//! # Example: channel
//!
//! A video channel as a topic: viewers subscribe, uploads are published.
//!
//! Shows how to:
//! - Implement the [`Receive`] trait for a custom receiver.
//! - Mix custom receivers, closures and the built-in [`LogWriter`].
//! - Read a [`DeliveryReport`](topicvisor::DeliveryReport) and observe the event [`Bus`].
//!
//! ## Flow
//! ```text
//! 5 viewers + mailer + audit log ──► Topic::subscribe()
//! upload #1 ──► Topic::publish() ──► everyone notified
//! "irene" leaves ──► Topic::unsubscribe()
//! upload #2 ──► Topic::publish() ──► irene skipped, mailer fails, rest notified
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example channel --features logging
//! ```

use async_trait::async_trait;
use topicvisor::{
    Bus, DeliveryError, EventKind, LogWriter, Receive, Subscriber, Topic, TopicConfig,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct Video {
    title: String,
}

/// Greets a single viewer by name.
struct Viewer {
    name: &'static str,
}

#[async_trait]
impl Receive<Video> for Viewer {
    async fn on_payload(&self, video: &Video) -> Result<(), DeliveryError> {
        println!("Hey {}, video {:?} uploaded", self.name, video.title);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let bus = Bus::new(64);
    let mut events = bus.subscribe();
    let watcher = tokio::spawn(async move {
        while let Ok(ev) = events.recv().await {
            if ev.kind == EventKind::Published {
                println!(
                    "[bus] published on {}: delivered={} failed={}",
                    ev.topic.as_deref().unwrap_or("<unknown>"),
                    ev.delivered.unwrap_or(0),
                    ev.failed.unwrap_or(0)
                );
            }
            if ev.kind == EventKind::TopicClosed {
                break;
            }
        }
    });

    let channel: Topic<Video> = Topic::builder("rustacean-station")
        .config(TopicConfig::default())
        .bus(bus)
        .build();

    for name in ["amit", "bella", "chen", "dario"] {
        channel.subscribe(&Subscriber::new(name, Viewer { name })).await;
    }
    let irene = Subscriber::from_fn("irene", |video: &Video| {
        println!("Hey irene, video {:?} uploaded", video.title);
        Ok(())
    });
    channel.subscribe(&irene).await;
    channel
        .subscribe(&Subscriber::from_fn("mailer", |video: &Video| {
            if video.title.contains("part 2") {
                return Err(DeliveryError::failed("smtp relay unavailable"));
            }
            Ok(())
        }))
        .await;
    channel
        .subscribe(&Subscriber::new("audit", LogWriter::labeled("audit")))
        .await;

    let report = channel
        .publish(Video {
            title: "async traits, part 1".into(),
        })
        .await;
    println!("upload #1 reached {:?}", report.subscribers());

    channel.unsubscribe(&irene).await;

    let report = channel
        .publish(Video {
            title: "async traits, part 2".into(),
        })
        .await;
    println!("upload #2 reached {:?}", report.subscribers());
    for (_, delivery) in report.failures() {
        println!("failed: {} ({:?})", delivery.subscriber, delivery.outcome);
    }

    channel.teardown().await;
    watcher.await?;
    Ok(())
}
