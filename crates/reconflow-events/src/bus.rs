//! Scoped broadcast bus.
//!
//! Each scope (one job, one target, or the global feed) owns a lazily created
//! `tokio::sync::broadcast` channel. Publishing never blocks: events sent to a
//! scope with no observers are dropped, and an observer that falls more than
//! `capacity` events behind skips ahead instead of stalling the publisher.

use crate::event::BusEvent;
use reconflow_core::{EventsConfig, JobId, TargetId};
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use tokio::sync::broadcast;

/// Subscription scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeKey {
    /// Events for a single job
    Job(JobId),
    /// Events for every job on a target
    Target(TargetId),
    /// Status transitions of every job
    Global,
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Job(id) => write!(f, "job:{id}"),
            Self::Target(id) => write!(f, "target:{id}"),
            Self::Global => f.write_str("global"),
        }
    }
}

/// Publish/subscribe hub keyed by [`ScopeKey`].
pub struct ProgressBus {
    channels: RwLock<HashMap<ScopeKey, broadcast::Sender<BusEvent>>>,
    capacity: usize,
}

impl fmt::Debug for ProgressBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressBus")
            .field("capacity", &self.capacity)
            .field("scopes", &self.scope_count())
            .finish()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new(EventsConfig::default().channel_capacity)
    }
}

impl ProgressBus {
    /// Create a bus buffering `capacity` events per scope.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Create a bus from configuration.
    #[must_use]
    pub fn from_config(config: &EventsConfig) -> Self {
        Self::new(config.channel_capacity)
    }

    /// Register an observer for `key`.
    ///
    /// The observer sees every event published to the scope after this call.
    pub fn subscribe(&self, key: ScopeKey) -> Subscription {
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let rx = channels
            .entry(key.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        tracing::debug!(scope = %key, "observer subscribed");
        Subscription { key, rx }
    }

    /// Remove an observer. The scope's channel is released once it has none left.
    pub fn unsubscribe(&self, subscription: Subscription) {
        let key = subscription.key.clone();
        drop(subscription);
        self.prune(&key);
        tracing::debug!(scope = %key, "observer unsubscribed");
    }

    /// Deliver `event` to every current observer of `key`.
    ///
    /// Returns the number of observers the event was handed to.
    pub fn publish(&self, key: &ScopeKey, event: BusEvent) -> usize {
        let delivered = {
            let channels = self
                .channels
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            match channels.get(key) {
                Some(sender) => sender.send(event).ok(),
                None => return 0,
            }
        };

        match delivered {
            Some(count) => count,
            None => {
                // Every observer dropped its subscription without unsubscribing.
                self.prune(key);
                0
            }
        }
    }

    /// Number of observers currently registered for `key`.
    #[must_use]
    pub fn observer_count(&self, key: &ScopeKey) -> usize {
        self.channels
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Number of scopes with a live channel.
    #[must_use]
    pub fn scope_count(&self) -> usize {
        self.channels
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    fn prune(&self, key: &ScopeKey) {
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if channels
            .get(key)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(key);
        }
    }
}

/// A registered observer of one scope.
#[derive(Debug)]
pub struct Subscription {
    key: ScopeKey,
    rx: broadcast::Receiver<BusEvent>,
}

impl Subscription {
    /// The scope this subscription observes.
    #[must_use]
    pub fn key(&self) -> &ScopeKey {
        &self.key
    }

    /// Wait for the next event.
    ///
    /// Returns `None` only if the scope's channel has been torn down.
    pub async fn recv(&mut self) -> Option<BusEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(scope = %self.key, skipped, "observer lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<BusEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(scope = %self.key, skipped, "observer lagged, events dropped");
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ProgressEvent, ProgressKind, ProgressPayload};
    use chrono::Utc;
    use std::time::Duration;

    fn message(job_id: &JobId, text: &str) -> BusEvent {
        BusEvent::Progress(ProgressEvent {
            job_id: job_id.clone(),
            target_id: TargetId::new("target").expect("valid"),
            kind: ProgressKind::Update,
            payload: ProgressPayload::Message {
                text: text.to_string(),
            },
            timestamp: Utc::now(),
        })
    }

    fn text_of(event: &BusEvent) -> String {
        event
            .as_progress()
            .and_then(|e| e.payload.text())
            .unwrap_or_default()
            .to_string()
    }

    #[test]
    fn test_publish_without_observers_is_noop() {
        let bus = ProgressBus::new(4);
        let job = JobId::generate();
        assert_eq!(bus.publish(&ScopeKey::Job(job.clone()), message(&job, "x")), 0);
        assert_eq!(bus.scope_count(), 0);
    }

    #[tokio::test]
    async fn test_events_arrive_in_publish_order() {
        let bus = ProgressBus::new(16);
        let job = JobId::generate();
        let key = ScopeKey::Job(job.clone());
        let mut sub = bus.subscribe(key.clone());

        for i in 0..5 {
            assert_eq!(bus.publish(&key, message(&job, &format!("line {i}"))), 1);
        }

        for i in 0..5 {
            let event = sub.recv().await.expect("event");
            assert_eq!(text_of(&event), format!("line {i}"));
        }
    }

    #[tokio::test]
    async fn test_every_observer_sees_every_event() {
        let bus = ProgressBus::new(16);
        let job = JobId::generate();
        let key = ScopeKey::Job(job.clone());
        let mut first = bus.subscribe(key.clone());
        let mut second = bus.subscribe(key.clone());

        assert_eq!(bus.publish(&key, message(&job, "hello")), 2);
        assert_eq!(text_of(&first.recv().await.expect("first")), "hello");
        assert_eq!(text_of(&second.recv().await.expect("second")), "hello");
    }

    #[tokio::test]
    async fn test_scopes_are_isolated() {
        let bus = ProgressBus::new(16);
        let job_a = JobId::generate();
        let job_b = JobId::generate();
        let mut sub_a = bus.subscribe(ScopeKey::Job(job_a.clone()));

        bus.publish(&ScopeKey::Job(job_b.clone()), message(&job_b, "b"));
        bus.publish(&ScopeKey::Job(job_a.clone()), message(&job_a, "a"));

        let event = sub_a.recv().await.expect("event");
        assert_eq!(event.job_id(), &job_a);
        assert!(sub_a.try_recv().is_none());
    }

    #[test]
    fn test_unsubscribe_releases_scope() {
        let bus = ProgressBus::new(4);
        let key = ScopeKey::Global;
        let first = bus.subscribe(key.clone());
        let second = bus.subscribe(key.clone());
        assert_eq!(bus.observer_count(&key), 2);

        bus.unsubscribe(first);
        assert_eq!(bus.observer_count(&key), 1);
        assert_eq!(bus.scope_count(), 1);

        bus.unsubscribe(second);
        assert_eq!(bus.observer_count(&key), 0);
        assert_eq!(bus.scope_count(), 0);
    }

    #[test]
    fn test_dropped_subscription_is_pruned_on_publish() {
        let bus = ProgressBus::new(4);
        let job = JobId::generate();
        let key = ScopeKey::Job(job.clone());
        drop(bus.subscribe(key.clone()));

        assert_eq!(bus.publish(&key, message(&job, "nobody")), 0);
        assert_eq!(bus.scope_count(), 0);
    }

    #[tokio::test]
    async fn test_slow_observer_does_not_block_publisher() {
        let bus = ProgressBus::new(2);
        let job = JobId::generate();
        let key = ScopeKey::Job(job.clone());
        let mut slow = bus.subscribe(key.clone());

        let publish_all = async {
            for i in 0..10 {
                bus.publish(&key, message(&job, &format!("{i}")));
            }
        };
        tokio::time::timeout(Duration::from_secs(1), publish_all)
            .await
            .expect("publishing must not block");

        // Lagged events are skipped; the newest ones are still delivered.
        let event = slow.recv().await.expect("event");
        assert_eq!(text_of(&event), "8");
        assert_eq!(text_of(&slow.recv().await.expect("event")), "9");
    }
}
