//! Bounded, per-user ordered history of captured items.
//!
//! One combined collection across identities, newest-first; per-owner
//! filtering happens at eviction time. Eviction prefers the unstarred item
//! nearest the tail; only when every owned item is starred does the absolute
//! oldest entry go. A second ceiling pass runs keyed on the resolved email,
//! which can diverge from the raw key used by the primary pass.

use crate::store::{keys, KeyValueStore, StoreError};
use crate::types::CapturedItem;
use serde_json::Value;
use tracing::debug;

/// Ordered snippet collection with capacity-constrained inserts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryList {
    items: Vec<CapturedItem>,
}

impl HistoryList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<CapturedItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[CapturedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of items owned by the given identity.
    pub fn count_for(&self, owner: Option<&str>) -> usize {
        self.items
            .iter()
            .filter(|item| item.email.as_deref() == owner)
            .count()
    }

    /// Index of the owner's unstarred item nearest the tail, if any.
    fn rear_unstarred_index(&self, owner: Option<&str>) -> Option<usize> {
        self.items
            .iter()
            .rposition(|item| item.email.as_deref() == owner && !item.starred)
    }

    /// Prepend an item and evict until the capacity invariants hold again.
    ///
    /// `primary_key` is the raw last-logged-in value that bounds the tier
    /// capacity; `secondary_key` is the resolved email the hard ceiling is
    /// keyed on. They usually agree but are applied independently.
    pub fn insert(
        &mut self,
        item: CapturedItem,
        max_items: usize,
        hard_ceiling: usize,
        primary_key: Option<&str>,
        secondary_key: Option<&str>,
    ) {
        self.items.insert(0, item);

        while self.count_for(primary_key) > max_items {
            if let Some(index) = self.rear_unstarred_index(primary_key) {
                debug!("evicting unstarred item at {}", index);
                self.items.remove(index);
            } else {
                // Everything owned is starred: the absolute oldest entry goes.
                debug!("all owned items starred, evicting list tail");
                self.items.pop();
            }
        }

        if self.count_for(secondary_key) > hard_ceiling {
            if let Some(last) = self
                .items
                .iter()
                .rposition(|it| it.email.as_deref() == secondary_key)
            {
                if !self.items[last].starred {
                    self.items.remove(last);
                } else if let Some(index) = self.rear_unstarred_index(secondary_key) {
                    self.items.remove(index);
                }
                // All starred: the ceiling pass removes nothing.
            }
        }
    }

    /// Remove the item at `index`; out-of-range indices are silently ignored.
    pub fn remove_at(&mut self, index: usize) -> bool {
        if index < self.items.len() {
            self.items.remove(index);
            true
        } else {
            false
        }
    }

    /// Flip the starred state of the item at `index`. Order and length are
    /// unaffected; `last_modified` is refreshed.
    pub fn toggle_star(&mut self, index: usize, now_ms: i64) -> bool {
        match self.items.get_mut(index) {
            Some(item) => {
                item.starred = !item.starred;
                item.last_modified = now_ms;
                true
            }
            None => false,
        }
    }

    /// Load the persisted list. The stored value is a JSON string holding the
    /// array, matching what other frontends of the store write.
    pub async fn load(store: &dyn KeyValueStore) -> Result<Self, StoreError> {
        let items = match store.get(keys::HISTORY).await? {
            Some(Value::String(text)) => serde_json::from_str(&text)?,
            // Tolerate a directly stored array.
            Some(value @ Value::Array(_)) => serde_json::from_value(value)?,
            _ => Vec::new(),
        };
        Ok(Self { items })
    }

    /// Persist the full list.
    pub async fn save(&self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        let text = serde_json::to_string(&self.items)?;
        store.set(keys::HISTORY, Value::String(text)).await
    }
}
