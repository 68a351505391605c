//! Change notifications for subscribers.
//!
//! Two producers publish into one `ChangeFeed`: the core itself on every
//! mutation (push) and the poller (poll), which rereads recently updated rows.
//! Delivery order across them is not guaranteed and the same change can
//! arrive twice, so every consumer filters through its own `SeenSet`.

pub mod handlers;
pub mod poller;

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::models::notification::Notification;

const DEFAULT_CAPACITY: usize = 1024;
const DEFAULT_SEEN_CAPACITY: usize = 4096;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    Upserted { notification: Notification },
    Deleted { id: Uuid, user_id: Uuid },
}

impl ChangeEvent {
    pub fn user_id(&self) -> Uuid {
        match self {
            ChangeEvent::Upserted { notification } => notification.user_id,
            ChangeEvent::Deleted { user_id, .. } => *user_id,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            ChangeEvent::Upserted { notification } => notification.id,
            ChangeEvent::Deleted { id, .. } => *id,
        }
    }
}

#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishing with no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        if self.tx.send(event).is_err() {
            debug!("Change event dropped: no subscribers");
        }
    }

    pub fn upserted(&self, notification: &Notification) {
        self.publish(ChangeEvent::Upserted {
            notification: notification.clone(),
        });
    }

    pub fn deleted(&self, user_id: Uuid, id: Uuid) {
        self.publish(ChangeEvent::Deleted { id, user_id });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Per-consumer dedup by notification id.
///
/// An upsert passes only if it is newer than anything seen for that id; once
/// an id is deleted nothing more about it passes. Memory is bounded: past
/// `capacity` ids the oldest remembered id is forgotten.
#[derive(Debug)]
pub struct SeenSet {
    latest: HashMap<Uuid, Option<DateTime<Utc>>>,
    order: VecDeque<Uuid>,
    capacity: usize,
}

impl Default for SeenSet {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_SEEN_CAPACITY)
    }
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            latest: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.latest.len()
    }

    /// Returns `true` if the event should be delivered.
    pub fn admit(&mut self, event: &ChangeEvent) -> bool {
        match event {
            ChangeEvent::Upserted { notification } => {
                match self.latest.get(&notification.id) {
                    Some(None) => false,
                    Some(Some(seen)) if *seen >= notification.updated_at => false,
                    _ => {
                        self.remember(notification.id, Some(notification.updated_at));
                        true
                    }
                }
            }
            ChangeEvent::Deleted { id, .. } => {
                if matches!(self.latest.get(id), Some(None)) {
                    return false;
                }
                self.remember(*id, None);
                true
            }
        }
    }

    fn remember(&mut self, id: Uuid, version: Option<DateTime<Utc>>) {
        if self.latest.insert(id, version).is_some() {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.latest.remove(&oldest);
            }
        }
    }
}
