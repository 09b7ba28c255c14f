//! In-memory conversation sessions and processed-order ledger.
//!
//! Nothing here survives a restart.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::conversation::ConversationState;

/// One conversation per user per chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub chat_id: i64,
    pub user_id: i64,
}

/// Active conversations. Written only by the bot engine.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<DashMap<SessionKey, ConversationState>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &SessionKey) -> Option<ConversationState> {
        self.inner.get(key).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, key: SessionKey, state: ConversationState) {
        self.inner.insert(key, state);
    }

    pub fn remove(&self, key: &SessionKey) -> Option<ConversationState> {
        self.inner.remove(key).map(|(_, state)| state)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Orders whose "finished" payment has already been processed.
///
/// The processor may resend the same notification; processing is keyed on
/// `order_id` so a repeat is recognised and skipped. Entries live in memory
/// only, so growth is bounded by [`OrderLedger::prune_before`].
#[derive(Debug, Clone, Default)]
pub struct OrderLedger {
    inner: Arc<DashMap<String, DateTime<Utc>>>,
}

impl OrderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an order. Returns `false` if it was already recorded.
    pub fn record(&self, order_id: &str) -> bool {
        match self.inner.entry(order_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Utc::now());
                true
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn record_at(&self, order_id: &str, processed_at: DateTime<Utc>) {
        self.inner.insert(order_id.to_string(), processed_at);
    }

    /// Forget orders processed before `cutoff`. Returns how many were removed.
    pub fn prune_before(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.inner.len();
        self.inner.retain(|_, processed_at| *processed_at >= cutoff);
        before.saturating_sub(self.inner.len())
    }

    pub fn processed_at(&self, order_id: &str) -> Option<DateTime<Utc>> {
        self.inner.get(order_id).map(|entry| *entry.value())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
