//! Realtime chat for offer threads.
//!
//! Each offer has one broadcast channel. Stored messages are published after
//! they are written, and a subscriber that also replays history filters out
//! anything it has already delivered.

pub mod filter;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::models::Message;

const THREAD_CAPACITY: usize = 256;

type Threads = Arc<RwLock<HashMap<Uuid, broadcast::Sender<Message>>>>;

#[derive(Clone, Default)]
pub struct ChatHub {
    threads: Threads,
}

impl ChatHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends a stored message to everyone watching its thread. Threads with
    /// no remaining watchers are dropped.
    pub async fn publish(&self, message: Message) {
        let mut threads = self.threads.write().await;
        let offer_id = message.offer_id;
        if let Some(sender) = threads.get(&offer_id) {
            if sender.send(message).is_err() {
                threads.remove(&offer_id);
                tracing::debug!(%offer_id, "Dropped chat thread without subscribers");
            }
        }
    }

    pub async fn subscribe(&self, offer_id: Uuid) -> broadcast::Receiver<Message> {
        let mut threads = self.threads.write().await;
        threads
            .entry(offer_id)
            .or_insert_with(|| broadcast::channel(THREAD_CAPACITY).0)
            .subscribe()
    }

    /// Drops a thread once its last watcher has gone.
    pub async fn release(&self, offer_id: Uuid) {
        let mut threads = self.threads.write().await;
        if threads
            .get(&offer_id)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            threads.remove(&offer_id);
            tracing::debug!(%offer_id, "Released idle chat thread");
        }
    }

    /// Ends every stream watching a thread. Used when an offer is replaced
    /// and its messages move to the new offer id; clients reconnect there.
    pub async fn close(&self, offer_id: Uuid) {
        if self.threads.write().await.remove(&offer_id).is_some() {
            tracing::debug!(%offer_id, "Closed chat thread");
        }
    }

    pub async fn thread_count(&self) -> usize {
        self.threads.read().await.len()
    }
}

/// Remembers which message ids were already delivered on one connection.
#[derive(Debug, Default)]
pub struct DeliveryFilter {
    seen: HashSet<Uuid>,
}

impl DeliveryFilter {
    /// True the first time an id is offered.
    pub fn admit(&mut self, message_id: Uuid) -> bool {
        self.seen.insert(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(offer_id: Uuid) -> Message {
        Message {
            id: Uuid::new_v4(),
            offer_id,
            sender_id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            content: "Still available?".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_publish_order() {
        let hub = ChatHub::new();
        let offer_id = Uuid::new_v4();
        let mut rx = hub.subscribe(offer_id).await;

        let first = message(offer_id);
        let second = message(offer_id);
        hub.publish(first.clone()).await;
        hub.publish(second.clone()).await;

        assert_eq!(rx.recv().await.unwrap(), first);
        assert_eq!(rx.recv().await.unwrap(), second);
    }

    #[tokio::test]
    async fn test_threads_are_isolated() {
        let hub = ChatHub::new();
        let watched = Uuid::new_v4();
        let mut rx = hub.subscribe(watched).await;

        hub.publish(message(Uuid::new_v4())).await;
        let expected = message(watched);
        hub.publish(expected.clone()).await;

        assert_eq!(rx.recv().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_thread_dropped_once_nobody_listens() {
        let hub = ChatHub::new();
        let offer_id = Uuid::new_v4();
        drop(hub.subscribe(offer_id).await);
        assert_eq!(hub.thread_count().await, 1);

        hub.publish(message(offer_id)).await;
        assert_eq!(hub.thread_count().await, 0);
    }

    #[tokio::test]
    async fn test_release_keeps_watched_threads() {
        let hub = ChatHub::new();
        let offer_id = Uuid::new_v4();
        let rx = hub.subscribe(offer_id).await;

        hub.release(offer_id).await;
        assert_eq!(hub.thread_count().await, 1);

        drop(rx);
        hub.release(offer_id).await;
        assert_eq!(hub.thread_count().await, 0);
    }

    #[tokio::test]
    async fn test_close_ends_open_streams() {
        let hub = ChatHub::new();
        let replaced = Uuid::new_v4();
        let mut rx = hub.subscribe(replaced).await;

        hub.close(replaced).await;
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
        assert_eq!(hub.thread_count().await, 0);
    }

    #[test]
    fn test_delivery_filter_dedupes() {
        let mut filter = DeliveryFilter::default();
        let id = Uuid::new_v4();
        assert!(filter.admit(id));
        assert!(!filter.admit(id));
        assert!(filter.admit(Uuid::new_v4()));
    }
}
