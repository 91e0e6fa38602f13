//! Wire event types for conversation streaming.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared component type of an item.
///
/// The enumeration is closed; tags that do not match a known component are
/// preserved verbatim in [`ComponentKind::Unknown`] so the fallback renderer
/// can still show something useful.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// Plain markdown text, streamed incrementally.
    Markdown,
    /// A tool invocation with args and accumulated output.
    ToolCall,
    /// Transcript of a nested sub-agent conversation.
    SubAgent,
    /// Structured feed entries, each keyed by its own id.
    Feed,
    /// Multi-section report; sections are keyed by name.
    Report,
    /// Anything else; the raw tag is kept for display.
    Unknown(String),
}

impl ComponentKind {
    pub fn as_str(&self) -> &str {
        match self {
            ComponentKind::Markdown => "markdown",
            ComponentKind::ToolCall => "tool_call",
            ComponentKind::SubAgent => "sub_agent",
            ComponentKind::Feed => "feed",
            ComponentKind::Report => "report",
            ComponentKind::Unknown(tag) => tag,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ComponentKind::Unknown(_))
    }
}

impl From<&str> for ComponentKind {
    fn from(tag: &str) -> Self {
        match tag {
            "markdown" => ComponentKind::Markdown,
            "tool_call" => ComponentKind::ToolCall,
            "sub_agent" => ComponentKind::SubAgent,
            "feed" => ComponentKind::Feed,
            "report" => ComponentKind::Report,
            other => ComponentKind::Unknown(other.to_string()),
        }
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ComponentKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ComponentKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(ComponentKind::from(tag.as_str()))
    }
}

/// Operation hint carried by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOp {
    /// First sighting of an item.
    Create,
    /// Grow the item's payload (text concatenation, entry/section upsert).
    Append,
    /// Overwrite the item's payload (or upsert for keyed payloads).
    Replace,
    /// Terminal transition; the item becomes immutable afterwards.
    Finalize,
}

/// One state-change notification for a conversation item.
///
/// Events arrive in arbitrary order and possibly duplicated; the merger is
/// responsible for making that safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    pub conversation_id: String,
    pub item_id: String,
    pub component_type: ComponentKind,
    pub op: EventOp,
    /// Payload fragment; shape depends on `component_type`.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
    /// Originating agent, for attribution in nested output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Causal ordering key; assigned locally when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Failure message; a finalize carrying this yields an error status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamEvent {
    /// Create an event with an explicit payload fragment.
    pub fn new(
        conversation_id: impl Into<String>,
        item_id: impl Into<String>,
        component_type: ComponentKind,
        op: EventOp,
        payload: Value,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            item_id: item_id.into(),
            component_type,
            op,
            payload,
            agent: None,
            sequence: None,
            timestamp: None,
            error: None,
        }
    }

    /// Create a markdown item with initial text.
    pub fn create_text(
        conversation_id: impl Into<String>,
        item_id: impl Into<String>,
        text: &str,
    ) -> Self {
        Self::new(
            conversation_id,
            item_id,
            ComponentKind::Markdown,
            EventOp::Create,
            Value::String(text.to_string()),
        )
    }

    /// Append a text fragment to an existing item.
    pub fn append_text(
        conversation_id: impl Into<String>,
        item_id: impl Into<String>,
        text: &str,
    ) -> Self {
        Self::new(
            conversation_id,
            item_id,
            ComponentKind::Markdown,
            EventOp::Append,
            Value::String(text.to_string()),
        )
    }

    /// Finalize an item as complete. No payload is carried.
    pub fn finalize(
        conversation_id: impl Into<String>,
        item_id: impl Into<String>,
        component_type: ComponentKind,
    ) -> Self {
        Self::new(
            conversation_id,
            item_id,
            component_type,
            EventOp::Finalize,
            Value::Null,
        )
    }

    /// Finalize an item as failed.
    pub fn finalize_error(
        conversation_id: impl Into<String>,
        item_id: impl Into<String>,
        component_type: ComponentKind,
        message: &str,
    ) -> Self {
        let mut event = Self::finalize(conversation_id, item_id, component_type);
        event.error = Some(message.to_string());
        event
    }

    /// Attach agent attribution.
    pub fn from_agent(mut self, agent: &str) -> Self {
        self.agent = Some(agent.to_string());
        self
    }

    /// Attach an explicit ordering key.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Events without both identity keys cannot be merged anywhere.
    pub fn is_well_formed(&self) -> bool {
        !self.conversation_id.is_empty() && !self.item_id.is_empty()
    }
}
