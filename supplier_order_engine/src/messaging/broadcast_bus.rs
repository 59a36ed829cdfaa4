use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use log::*;
use tokio::sync::broadcast;

use crate::messaging::{MessageBus, ServerMessage};

/// In-process [`MessageBus`] with one broadcast channel per user. Messages published while a user has no
/// subscribers are dropped; the challenge itself is persisted, so clients catch up by polling.
#[derive(Clone)]
pub struct BroadcastBus {
    capacity: usize,
    topics: Arc<Mutex<HashMap<i64, broadcast::Sender<ServerMessage>>>>,
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(32)
    }
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, topics: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Subscribes to the user's topic, creating it if necessary.
    pub fn subscribe(&self, user_id: i64) -> broadcast::Receiver<ServerMessage> {
        let mut topics = match self.topics.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        topics.entry(user_id).or_insert_with(|| broadcast::channel(self.capacity).0).subscribe()
    }
}

#[async_trait]
impl MessageBus for BroadcastBus {
    async fn publish(&self, user_id: i64, message: ServerMessage) {
        let mut topics = match self.topics.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(sender) = topics.get(&user_id) else {
            trace!("📬️ No subscribers for user {user_id}. Message dropped");
            return;
        };
        if sender.send(message).is_err() {
            // Every receiver has gone away.
            topics.remove(&user_id);
            trace!("📬️ Topic for user {user_id} closed");
        }
    }
}
