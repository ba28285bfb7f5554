//! Change notifier: a pub-sub broadcaster keyed by entity type.
//!
//! Every local transaction that touches posts/likes/comments/settings fires
//! a [`ChangeEvent`] after commit, the way a reactive-query layer notifies
//! observers after a flush (§2 / design note §9). This crate has no UI to
//! refresh, so the notifier is just a broadcast channel a host embedding
//! can subscribe to.

use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Post,
    Like,
    Comment,
    Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub entity: Entity,
}

/// Broadcaster with a bounded channel; slow/absent subscribers never block
/// a commit — a lagging receiver just misses old events on its next `recv`.
pub struct Notifier {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Publish a change. No-op if there are no subscribers.
    pub fn publish(&self, entity: Entity) {
        let _ = self.tx.send(ChangeEvent { entity });
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        notifier.publish(Entity::Post);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.entity, Entity::Post);
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let notifier = Notifier::new();
        notifier.publish(Entity::Like);
    }
}
