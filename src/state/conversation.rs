//! Per-conversation item list.

use serde::{Deserialize, Serialize};

use super::item::ChatItem;

/// Ordered state of a single conversation.
///
/// Items are kept ordered by `(sequence, item_id)` and `item_id` is unique
/// within the list. Both invariants are maintained by the merger; nothing
/// else mutates this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub conversation_id: String,
    pub items: Vec<ChatItem>,
}

impl ConversationState {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            items: Vec::new(),
        }
    }

    /// Look up an item by id.
    pub fn item(&self, item_id: &str) -> Option<&ChatItem> {
        self.items.iter().find(|i| i.item_id == item_id)
    }

    pub(crate) fn item_mut(&mut self, item_id: &str) -> Option<&mut ChatItem> {
        self.items.iter_mut().find(|i| i.item_id == item_id)
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.item(item_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Next locally assigned sequence: one past the current maximum, so
    /// sequence-less events land at the tail.
    pub fn next_sequence(&self) -> u64 {
        self.items
            .iter()
            .map(|i| i.sequence)
            .max()
            .map_or(0, |max| max + 1)
    }

    /// Insert keeping `(sequence, item_id)` order, so a fixed set of
    /// sequenced events converges to the same order however it arrives.
    pub(crate) fn insert_ordered(&mut self, item: ChatItem) {
        let at = self
            .items
            .iter()
            .position(|i| (i.sequence, i.item_id.as_str()) > (item.sequence, item.item_id.as_str()))
            .unwrap_or(self.items.len());
        self.items.insert(at, item);
    }
}
