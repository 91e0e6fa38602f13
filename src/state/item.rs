//! Conversation item types and payload merge rules.
//!
//! A [`ChatItem`] is one unit of agent output. Its payload shape follows the
//! declared component kind; the merge rules here are what make repeated or
//! out-of-order events safe to apply.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::{ComponentKind, EventOp};

/// Lifecycle status of an item.
///
/// `Complete` and `Error` are terminal; the merger never mutates a terminal
/// item again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ItemStatus {
    Streaming,
    Complete,
    Error { message: String },
}

impl ItemStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ItemStatus::Streaming)
    }
}

/// Payload of a tool-call item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallPayload {
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
    /// Accumulated tool output; grows while the item streams.
    #[serde(default)]
    pub output: String,
}

impl ToolCallPayload {
    fn apply(&mut self, op: EventOp, fragment: &Value) {
        if let Some(name) = fragment.get("tool_name").and_then(Value::as_str) {
            self.tool_name = name.to_string();
        }
        if let Some(args) = fragment.get("args") {
            if !args.is_null() {
                self.args = Some(args.clone());
            }
        }
        if let Some(output) = fragment.get("output").and_then(Value::as_str) {
            match op {
                EventOp::Append => self.output.push_str(output),
                _ => self.output = output.to_string(),
            }
        }
    }
}

/// One entry of a feed item, keyed by `entry_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub entry_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Value,
}

/// A named section of a report item. One level of nesting only; sections do
/// not nest further.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSection {
    pub name: String,
    #[serde(default)]
    pub body: Value,
}

/// Typed payload of a [`ChatItem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ItemPayload {
    /// Incremental text (markdown, sub-agent transcript).
    Text(String),
    Tool(ToolCallPayload),
    Feed(Vec<FeedEntry>),
    Report(Vec<ReportSection>),
    /// Payload of an unrecognized component kind, kept raw for the fallback
    /// renderer.
    Raw(Value),
}

impl ItemPayload {
    /// Build the initial payload for a freshly seen item.
    pub fn from_wire(kind: &ComponentKind, fragment: &Value) -> Self {
        match kind {
            ComponentKind::Markdown | ComponentKind::SubAgent => {
                ItemPayload::Text(text_fragment(fragment).unwrap_or_default().to_string())
            }
            ComponentKind::ToolCall => {
                let mut tool = ToolCallPayload::default();
                tool.apply(EventOp::Create, fragment);
                ItemPayload::Tool(tool)
            }
            ComponentKind::Feed => ItemPayload::Feed(parse_keyed(fragment, "entries")),
            ComponentKind::Report => ItemPayload::Report(parse_keyed(fragment, "sections")),
            ComponentKind::Unknown(_) => ItemPayload::Raw(fragment.clone()),
        }
    }

    /// Merge a payload fragment into this payload.
    ///
    /// Text concatenates on `Append` and overwrites otherwise; keyed payloads
    /// (feed entries, report sections) upsert by their own identifier, so a
    /// repeated update to the same key overwrites instead of duplicating.
    pub fn apply(&mut self, op: EventOp, fragment: &Value) {
        if fragment.is_null() {
            return;
        }
        match self {
            ItemPayload::Text(text) => {
                if let Some(t) = text_fragment(fragment) {
                    match op {
                        EventOp::Append => text.push_str(t),
                        _ => *text = t.to_string(),
                    }
                }
            }
            ItemPayload::Tool(tool) => tool.apply(op, fragment),
            ItemPayload::Feed(entries) => {
                for entry in parse_keyed::<FeedEntry>(fragment, "entries") {
                    match entries.iter_mut().find(|e| e.entry_id == entry.entry_id) {
                        Some(existing) => *existing = entry,
                        None => entries.push(entry),
                    }
                }
            }
            ItemPayload::Report(sections) => {
                for section in parse_keyed::<ReportSection>(fragment, "sections") {
                    match sections.iter_mut().find(|s| s.name == section.name) {
                        Some(existing) => *existing = section,
                        None => sections.push(section),
                    }
                }
            }
            ItemPayload::Raw(raw) => *raw = fragment.clone(),
        }
    }
}

/// Extract a text fragment: either a bare JSON string or `{"text": "..."}`.
fn text_fragment(fragment: &Value) -> Option<&str> {
    fragment
        .as_str()
        .or_else(|| fragment.get("text").and_then(Value::as_str))
}

/// Parse a list of keyed values from either a bare array or a wrapper object
/// (`{"entries": [...]}` / `{"sections": [...]}`). Entries that fail to
/// decode are skipped rather than poisoning the whole fragment.
fn parse_keyed<T: serde::de::DeserializeOwned>(fragment: &Value, field: &str) -> Vec<T> {
    let list = fragment.get(field).unwrap_or(fragment);
    let Some(items) = list.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|v| match serde_json::from_value(v.clone()) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::debug!("skipping undecodable {} fragment: {}", field, e);
                None
            }
        })
        .collect()
}

/// One unit of agent output within a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatItem {
    pub item_id: String,
    pub conversation_id: String,
    pub component: ComponentKind,
    pub payload: ItemPayload,
    pub status: ItemStatus,
    /// Ordering key within the conversation; from the wire when present,
    /// otherwise assigned past the conversation's current maximum.
    pub sequence: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatItem {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Text content for text-like items.
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            ItemPayload::Text(t) => Some(t),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_payload_append_concatenates() {
        let mut payload = ItemPayload::from_wire(&ComponentKind::Markdown, &json!("Hel"));
        payload.apply(EventOp::Append, &json!("lo"));
        assert_eq!(payload, ItemPayload::Text("Hello".to_string()));
    }

    #[test]
    fn test_text_payload_replace_overwrites() {
        let mut payload = ItemPayload::Text("draft".to_string());
        payload.apply(EventOp::Replace, &json!("final"));
        assert_eq!(payload, ItemPayload::Text("final".to_string()));
    }

    #[test]
    fn test_text_fragment_accepts_wrapper_object() {
        let mut payload = ItemPayload::Text(String::new());
        payload.apply(EventOp::Append, &json!({"text": "hi"}));
        assert_eq!(payload, ItemPayload::Text("hi".to_string()));
    }

    #[test]
    fn test_tool_payload_accumulates_output() {
        let mut payload = ItemPayload::from_wire(
            &ComponentKind::ToolCall,
            &json!({"tool_name": "grep", "args": {"pattern": "fn main"}}),
        );
        payload.apply(EventOp::Append, &json!({"output": "src/main.rs:1\n"}));
        payload.apply(EventOp::Append, &json!({"output": "src/lib.rs:7\n"}));

        let ItemPayload::Tool(tool) = payload else {
            panic!("Expected tool payload");
        };
        assert_eq!(tool.tool_name, "grep");
        assert_eq!(tool.output, "src/main.rs:1\nsrc/lib.rs:7\n");
        assert!(tool.args.is_some());
    }

    #[test]
    fn test_feed_upserts_by_entry_id() {
        let mut payload = ItemPayload::from_wire(
            &ComponentKind::Feed,
            &json!([{"entry_id": "a", "title": "First", "body": "one"}]),
        );
        payload.apply(
            EventOp::Append,
            &json!({"entries": [
                {"entry_id": "a", "title": "First (edited)", "body": "one"},
                {"entry_id": "b", "body": "two"}
            ]}),
        );

        let ItemPayload::Feed(entries) = payload else {
            panic!("Expected feed payload");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title.as_deref(), Some("First (edited)"));
        assert_eq!(entries[1].entry_id, "b");
    }

    #[test]
    fn test_report_section_replace_keeps_count() {
        let mut payload = ItemPayload::from_wire(
            &ComponentKind::Report,
            &json!({"sections": [{"name": "summary", "body": "v1"}]}),
        );
        for body in ["v2", "v3"] {
            payload.apply(
                EventOp::Replace,
                &json!({"sections": [{"name": "summary", "body": body}]}),
            );
        }

        let ItemPayload::Report(sections) = payload else {
            panic!("Expected report payload");
        };
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].body, json!("v3"));
    }

    #[test]
    fn test_undecodable_entries_are_skipped() {
        let mut payload = ItemPayload::Feed(Vec::new());
        payload.apply(
            EventOp::Append,
            &json!([{"body": "missing id"}, {"entry_id": "ok"}]),
        );

        let ItemPayload::Feed(entries) = payload else {
            panic!("Expected feed payload");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry_id, "ok");
    }

    #[test]
    fn test_raw_payload_replaces() {
        let kind = ComponentKind::Unknown("sparkline".to_string());
        let mut payload = ItemPayload::from_wire(&kind, &json!({"points": [1]}));
        payload.apply(EventOp::Append, &json!({"points": [1, 2]}));
        assert_eq!(payload, ItemPayload::Raw(json!({"points": [1, 2]})));
    }

    #[test]
    fn test_null_fragment_is_ignored() {
        let mut payload = ItemPayload::Text("keep".to_string());
        payload.apply(EventOp::Replace, &Value::Null);
        assert_eq!(payload, ItemPayload::Text("keep".to_string()));
    }

    #[test]
    fn test_status_terminality() {
        assert!(!ItemStatus::Streaming.is_terminal());
        assert!(ItemStatus::Complete.is_terminal());
        assert!(ItemStatus::Error {
            message: "boom".to_string()
        }
        .is_terminal());
    }
}
