//! Conversation state: the item model, the pure event merger, and the
//! process-wide store.

mod conversation;
mod item;
mod merge;
mod store;

pub use conversation::ConversationState;
pub use item::{ChatItem, FeedEntry, ItemPayload, ItemStatus, ReportSection, ToolCallPayload};
pub use merge::merge;
pub use store::{ConversationStore, Snapshot};
