//! Component renderer registry.
//!
//! A closed table from declared component kind to a rendering capability,
//! built once at startup. Lookup never fails: unrecognized kinds route to an
//! explicit fallback that shows the raw payload instead of crashing.

use std::collections::HashMap;
use std::io::{self, Write};

use crate::events::ComponentKind;
use crate::state::{ChatItem, ReportSection};

use super::components::{
    FallbackRenderer, FeedRenderer, MarkdownRenderer, RenderStyle, SubAgentRenderer,
    ToolCallRenderer,
};
use super::report::ReportRenderer;

/// Rendering capability for one item.
///
/// Renderers get read-only access to the item and must not reach back into
/// the store.
pub trait ItemRenderer: Send + Sync {
    fn render(&self, item: &ChatItem, out: &mut dyn Write) -> io::Result<()>;
}

/// Rendering capability for one named report section.
pub trait SectionRenderer: Send + Sync {
    fn render(&self, section: &ReportSection, out: &mut dyn Write) -> io::Result<()>;
}

/// The type-to-renderer table.
pub struct RendererRegistry {
    renderers: HashMap<ComponentKind, Box<dyn ItemRenderer>>,
    fallback: Box<dyn ItemRenderer>,
}

impl RendererRegistry {
    /// Build the registry with default styling.
    pub fn new() -> Self {
        Self::with_style(RenderStyle::default())
    }

    /// Build the registry. The table is closed; the component enumeration is
    /// fixed and known in advance.
    pub fn with_style(style: RenderStyle) -> Self {
        let mut renderers: HashMap<ComponentKind, Box<dyn ItemRenderer>> = HashMap::new();
        renderers.insert(
            ComponentKind::Markdown,
            Box::new(MarkdownRenderer::with_style(style.clone())),
        );
        renderers.insert(
            ComponentKind::ToolCall,
            Box::new(ToolCallRenderer::with_style(style.clone())),
        );
        renderers.insert(
            ComponentKind::SubAgent,
            Box::new(SubAgentRenderer::with_style(style.clone())),
        );
        renderers.insert(
            ComponentKind::Feed,
            Box::new(FeedRenderer::with_style(style.clone())),
        );
        renderers.insert(
            ComponentKind::Report,
            Box::new(ReportRenderer::with_style(style.clone())),
        );
        Self {
            renderers,
            fallback: Box::new(FallbackRenderer::with_style(style)),
        }
    }

    /// Render an item with the component its type declares, falling back for
    /// anything unrecognized.
    pub fn render_item(&self, item: &ChatItem, out: &mut dyn Write) -> io::Result<()> {
        self.resolve(&item.component).render(item, out)
    }

    /// Resolve a component kind to its renderer.
    pub fn resolve(&self, kind: &ComponentKind) -> &dyn ItemRenderer {
        self.renderers
            .get(kind)
            .unwrap_or(&self.fallback)
            .as_ref()
    }

    /// True when the kind has a dedicated renderer (not the fallback).
    pub fn has_renderer(&self, kind: &ComponentKind) -> bool {
        self.renderers.contains_key(kind)
    }
}

impl Default for RendererRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ComponentKind, EventOp, StreamEvent};
    use crate::state::{merge, ItemPayload, Snapshot};
    use serde_json::json;

    fn item_for(event: StreamEvent) -> ChatItem {
        let snapshot = merge(&Snapshot::default(), &event);
        snapshot
            .get(&event.conversation_id)
            .unwrap()
            .item(&event.item_id)
            .unwrap()
            .clone()
    }

    fn rendered(item: &ChatItem) -> String {
        let registry = RendererRegistry::new();
        let mut out = Vec::new();
        registry.render_item(item, &mut out).unwrap();
        String::from_utf8_lossy(&out).to_string()
    }

    #[test]
    fn test_every_known_kind_has_a_renderer() {
        let registry = RendererRegistry::new();
        for kind in [
            ComponentKind::Markdown,
            ComponentKind::ToolCall,
            ComponentKind::SubAgent,
            ComponentKind::Feed,
            ComponentKind::Report,
        ] {
            assert!(registry.has_renderer(&kind), "{} missing", kind);
        }
        assert!(!registry.has_renderer(&ComponentKind::from("sparkline")));
    }

    #[test]
    fn test_markdown_item_renders_text() {
        let item = item_for(StreamEvent::create_text("c", "1", "plain words"));
        assert!(rendered(&item).contains("plain words"));
    }

    #[test]
    fn test_tool_item_renders_name() {
        let item = item_for(StreamEvent::new(
            "c",
            "t",
            ComponentKind::ToolCall,
            EventOp::Create,
            json!({"tool_name": "grep", "output": "3 matches"}),
        ));
        let text = rendered(&item);
        assert!(text.contains("grep"));
        assert!(text.contains("3 matches"));
    }

    #[test]
    fn test_unknown_kind_uses_fallback_and_shows_raw_payload() {
        let item = item_for(StreamEvent::new(
            "c",
            "x",
            ComponentKind::from("sparkline"),
            EventOp::Create,
            json!({"points": [1, 2, 3]}),
        ));
        assert!(matches!(item.payload, ItemPayload::Raw(_)));

        let text = rendered(&item);
        assert!(text.contains("sparkline"));
        assert!(text.contains("points"));
    }

    #[test]
    fn test_report_sections_dispatch_by_name() {
        let item = item_for(StreamEvent::new(
            "c",
            "r",
            ComponentKind::Report,
            EventOp::Create,
            json!({"sections": [
                {"name": "summary", "body": "all good"},
                {"name": "metrics", "body": {"latency_ms": 12}},
                {"name": "appendix", "body": {"notes": "spillover"}}
            ]}),
        ));
        let text = rendered(&item);
        assert!(text.contains("all good"));
        assert!(text.contains("latency_ms"));
        // Unrecognized section name still renders via the section fallback.
        assert!(text.contains("appendix"));
        assert!(text.contains("spillover"));
    }
}
