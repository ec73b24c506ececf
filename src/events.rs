//! In-process lifecycle events.
//!
//! Processors publish these as shards are assigned and released. Observers
//! subscribe by closure and run synchronously on the publisher's thread,
//! so they must not block significantly. Events carry stream and shard
//! names rather than processor references, which keeps per-shard
//! processors free to drop when a lease moves.

use parking_lot::RwLock;
use std::sync::Arc;

/// A lifecycle signal from the consumer runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A shard processor finished initializing.
    WorkerInitialized { stream: String, shard: String },
    /// The scheduler asked the worker to drain and stop.
    ShutdownRequested { stream: String, shard: String },
    /// A shard was closed and fully consumed.
    ShardEnded { stream: String, shard: String },
    /// The shard lease moved to another worker.
    LeaseLost { stream: String, shard: String },
}

impl LifecycleEvent {
    /// The stream the event concerns.
    pub fn stream(&self) -> &str {
        match self {
            LifecycleEvent::WorkerInitialized { stream, .. }
            | LifecycleEvent::ShutdownRequested { stream, .. }
            | LifecycleEvent::ShardEnded { stream, .. }
            | LifecycleEvent::LeaseLost { stream, .. } => stream,
        }
    }

    /// The shard the event concerns.
    pub fn shard(&self) -> &str {
        match self {
            LifecycleEvent::WorkerInitialized { shard, .. }
            | LifecycleEvent::ShutdownRequested { shard, .. }
            | LifecycleEvent::ShardEnded { shard, .. }
            | LifecycleEvent::LeaseLost { shard, .. } => shard,
        }
    }
}

/// Subscriber callback type.
pub type Subscriber = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// A cheap-to-clone synchronous event bus.
///
/// Clones share one subscriber list.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for all future events.
    pub fn subscribe<F>(&self, subscriber: F)
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.subscribers.write().push(Arc::new(subscriber));
    }

    /// Deliver an event to every subscriber, in registration order.
    pub fn publish(&self, event: &LifecycleEvent) {
        let subscribers = self.subscribers.read();
        for subscriber in subscribers.iter() {
            subscriber(event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.read().len())
            .finish()
    }
}
