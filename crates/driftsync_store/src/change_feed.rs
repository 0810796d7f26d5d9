//! Change feed for observing committed transactions.
//!
//! Dependent views (feed lists, like counts, pending-upload badges) refresh
//! by subscribing to the entity kind they render. Events are emitted only
//! after a transaction commits, in commit order.

use crate::id::RecordId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};

/// The entity tables a subscriber can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// The posts table.
    Post,
    /// The likes table.
    Like,
    /// The comments table.
    Comment,
    /// The system settings singleton.
    Settings,
}

/// What happened to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    /// Record was inserted.
    Insert,
    /// Record was updated in place.
    Update,
    /// Record was hard-deleted.
    Delete,
}

/// A single committed change.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Commit sequence number; totally ordered across the store.
    pub sequence: u64,
    /// Which table changed.
    pub kind: EntityKind,
    /// Which record changed.
    pub id: RecordId,
    /// How it changed.
    pub change: ChangeType,
}

/// Post-commit pub-sub, keyed by entity kind.
///
/// Disconnected subscribers are reaped on the next emit for their kind.
pub struct ChangeFeed {
    subscribers: RwLock<HashMap<EntityKind, Vec<Sender<ChangeEvent>>>>,
}

impl ChangeFeed {
    /// Creates an empty feed.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribes to all future changes of one entity kind.
    pub fn subscribe(&self, kind: EntityKind) -> Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().entry(kind).or_default().push(tx);
        rx
    }

    /// Emits a committed change to the kind's subscribers.
    pub fn emit(&self, event: ChangeEvent) {
        let mut subscribers = self.subscribers.write();
        if let Some(senders) = subscribers.get_mut(&event.kind) {
            senders.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    /// Emits all changes of one commit, preserving order.
    pub fn emit_batch(&self, events: Vec<ChangeEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    /// Number of live subscribers for a kind.
    pub fn subscriber_count(&self, kind: EntityKind) -> usize {
        self.subscribers
            .read()
            .get(&kind)
            .map_or(0, |senders| senders.len())
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
