//! Event bus for dogquiz using tokio::broadcast
//!
//! The record store publishes a change event after every committed write;
//! live queries and the scheduler publish on the same bus.

use crate::scheduler::TaskKind;
use tokio::sync::broadcast;

/// Table touched by a committed write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Breeds,
    Images,
    DailyStats,
}

/// Events emitted by the cache layer
#[derive(Debug, Clone)]
pub enum CacheEvent {
    /// Rows in a table were inserted, updated or deleted
    Changed(Table),
    /// A breed listing was written through from upstream
    BreedsRefreshed { count: usize },
    /// A breed's favorite flag was toggled
    FavoriteChanged { breed_id: String, favorite: bool },
    /// Every cached breed and image was removed
    Cleared,
    /// A background or manual task finished
    TaskFinished { kind: TaskKind, success: bool },
}

impl CacheEvent {
    /// True when the event may change the rows of `table`
    pub fn touches(&self, table: Table) -> bool {
        match self {
            CacheEvent::Changed(t) => *t == table,
            CacheEvent::BreedsRefreshed { .. } | CacheEvent::FavoriteChanged { .. } => {
                table == Table::Breeds
            }
            CacheEvent::Cleared => table != Table::DailyStats,
            CacheEvent::TaskFinished { .. } => false,
        }
    }
}

/// Event bus for broadcasting cache events
pub struct EventBus {
    sender: broadcast::Sender<CacheEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create with default capacity (256 events)
    pub fn default_capacity() -> Self {
        Self::new(256)
    }

    pub fn publish(&self, event: CacheEvent) {
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::default_capacity()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
