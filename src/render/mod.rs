//! Terminal rendering: per-component renderers behind a closed registry.

mod components;
mod registry;
mod report;

pub use components::{MarkdownRenderer, RenderStyle, StreamingMarkdown};
pub use registry::{ItemRenderer, RendererRegistry, SectionRenderer};
pub use report::ReportRenderer;
