//! The stream event merger.
//!
//! `merge(snapshot, event)` is the single code path through which every
//! event, push or poll, becomes conversation state. It is total and
//! deterministic for a given input pair, and it only ever replaces the
//! affected conversation, so consumers can change-detect with `Arc::ptr_eq`.

use std::sync::Arc;

use crate::events::{EventOp, StreamEvent};

use super::conversation::ConversationState;
use super::item::{ChatItem, ItemPayload, ItemStatus};
use super::store::Snapshot;

/// Merge one event into a snapshot, producing the next snapshot.
///
/// Malformed events (missing identity) and events targeting terminal items
/// leave the snapshot unchanged; neither is allowed to disturb unrelated
/// conversations or panic.
pub fn merge(snapshot: &Snapshot, event: &StreamEvent) -> Snapshot {
    if !event.is_well_formed() {
        tracing::warn!(
            conversation = %event.conversation_id,
            item = %event.item_id,
            "dropping event with missing identity"
        );
        return snapshot.clone();
    }

    let mut conversation = match snapshot.conversations.get(&event.conversation_id) {
        Some(existing) => existing.as_ref().clone(),
        None => ConversationState::new(&event.conversation_id),
    };

    if !apply(&mut conversation, event) {
        // Stale or duplicate; keep every conversation referentially intact.
        return snapshot.clone();
    }

    let mut next = snapshot.clone();
    next.conversations
        .insert(event.conversation_id.clone(), Arc::new(conversation));
    next
}

/// Apply an event to a conversation in place. Returns false when the event
/// changed nothing.
fn apply(conversation: &mut ConversationState, event: &StreamEvent) -> bool {
    match conversation.item_mut(&event.item_id) {
        None => {
            conversation.insert_ordered(new_item(conversation, event));
            true
        }
        Some(item) => {
            if item.is_terminal() {
                tracing::trace!(
                    conversation = %event.conversation_id,
                    item = %event.item_id,
                    "discarding event for terminal item"
                );
                return false;
            }
            item.payload.apply(event.op, &event.payload);
            if event.agent.is_some() {
                item.agent = event.agent.clone();
            }
            if event.op == EventOp::Finalize {
                item.status = terminal_status(event);
            }
            true
        }
    }
}

fn new_item(conversation: &ConversationState, event: &StreamEvent) -> ChatItem {
    let status = if event.op == EventOp::Finalize {
        terminal_status(event)
    } else {
        ItemStatus::Streaming
    };
    ChatItem {
        item_id: event.item_id.clone(),
        conversation_id: event.conversation_id.clone(),
        component: event.component_type.clone(),
        payload: ItemPayload::from_wire(&event.component_type, &event.payload),
        status,
        sequence: event
            .sequence
            .unwrap_or_else(|| conversation.next_sequence()),
        agent: event.agent.clone(),
        timestamp: event.timestamp,
    }
}

fn terminal_status(event: &StreamEvent) -> ItemStatus {
    match &event.error {
        Some(message) => ItemStatus::Error {
            message: message.clone(),
        },
        None => ItemStatus::Complete,
    }
}
