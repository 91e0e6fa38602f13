//! Parley Library
//!
//! Core functionality for the Parley streaming conversation client.
//!
//! ## Main Components
//!
//! - [`events`] - Wire event types and the broadcast bus
//! - [`state`] - Conversation state: items, the pure merger, the store
//! - [`render`] - Terminal renderers behind a closed registry
//! - [`poll`] - Background task reconciliation
//! - [`transport`] - Server-sent events push transport
//! - [`config`] - Configuration and settings management
//!
//! ## Quick Start
//!
//! ```ignore
//! use parley::{ConversationStore, EventBus, RendererRegistry, StreamEvent};
//!
//! let bus = EventBus::new();
//! let store = ConversationStore::new();
//! let registry = RendererRegistry::new();
//!
//! store.dispatch(&StreamEvent::create_text("conv", "1", "Hello"));
//! ```

pub mod config;
pub mod events;
pub mod poll;
pub mod render;
pub mod state;
pub mod transport;

// Re-export commonly used types
pub use config::{Settings, XdgDirs};
pub use events::{BusError, ComponentKind, EventBus, EventOp, EventReceiver, EventSender, StreamEvent};
pub use poll::{HttpTaskSource, PollerState, TaskPoller, TaskResult, TaskSource, TaskStatus};
pub use render::{ItemRenderer, RenderStyle, RendererRegistry, SectionRenderer, StreamingMarkdown};
pub use state::{
    ChatItem, ConversationState, ConversationStore, ItemPayload, ItemStatus, Snapshot, merge,
};
pub use transport::SseTransport;
