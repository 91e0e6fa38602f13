//! Process-wide conversation store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::events::StreamEvent;

use super::conversation::ConversationState;
use super::merge::merge;

/// Immutable view of every conversation plus the current selection.
///
/// Conversations are held behind `Arc` so a merge replaces only the affected
/// entry; everything else stays referentially identical, which makes change
/// detection a pointer comparison.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub conversations: HashMap<String, Arc<ConversationState>>,
    pub current: Option<String>,
}

impl Snapshot {
    pub fn get(&self, conversation_id: &str) -> Option<&Arc<ConversationState>> {
        self.conversations.get(conversation_id)
    }

    /// The conversation currently in focus, if any.
    pub fn current_conversation(&self) -> Option<&Arc<ConversationState>> {
        self.current.as_deref().and_then(|id| self.get(id))
    }
}

#[cfg(test)]
impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.current == other.current
            && self.conversations.len() == other.conversations.len()
            && self
                .conversations
                .iter()
                .all(|(k, v)| other.conversations.get(k).map(|o| o.as_ref()) == Some(v.as_ref()))
    }
}

/// Owner of all conversation state.
///
/// [`ConversationStore::dispatch`] is the only mutation path; reads hand out
/// the latest snapshot, so concurrent readers never observe a half-merged
/// state.
pub struct ConversationStore {
    inner: RwLock<Arc<Snapshot>>,
}

impl ConversationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner
            .read()
            .map(|guard| Arc::clone(&*guard))
            .unwrap_or_default()
    }

    /// Look up one conversation in the current snapshot.
    pub fn get(&self, conversation_id: &str) -> Option<Arc<ConversationState>> {
        self.snapshot().get(conversation_id).cloned()
    }

    /// Run an event through the merger and publish the resulting snapshot.
    pub fn dispatch(&self, event: &StreamEvent) {
        let Ok(mut guard) = self.inner.write() else {
            tracing::error!("conversation store lock poisoned; event dropped");
            return;
        };
        let next = merge(&guard, event);
        *guard = Arc::new(next);
    }

    /// Select the conversation in focus. Independent of merge logic.
    pub fn set_current(&self, conversation_id: impl Into<String>) {
        self.replace(|snapshot| snapshot.current = Some(conversation_id.into()));
    }

    /// Currently focused conversation id.
    pub fn current(&self) -> Option<String> {
        self.snapshot().current.clone()
    }

    /// Drop all conversations and the current selection.
    pub fn reset(&self) {
        let Ok(mut guard) = self.inner.write() else {
            tracing::error!("conversation store lock poisoned; reset skipped");
            return;
        };
        *guard = Arc::new(Snapshot::default());
    }

    fn replace(&self, mutate: impl FnOnce(&mut Snapshot)) {
        let Ok(mut guard) = self.inner.write() else {
            tracing::error!("conversation store lock poisoned; update skipped");
            return;
        };
        let mut next = guard.as_ref().clone();
        mutate(&mut next);
        *guard = Arc::new(next);
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}
