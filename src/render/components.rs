//! Terminal renderers for the built-in component kinds.

use std::io::{self, Write};

use crossterm::{
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    ExecutableCommand,
};
use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;
use syntect::util::{as_24_bit_terminal_escaped, LinesWithEndings};

use crate::state::{ChatItem, ItemPayload, ItemStatus};

use super::registry::ItemRenderer;

/// Render style configuration.
#[derive(Debug, Clone)]
pub struct RenderStyle {
    pub accent_color: Color,
    pub success_color: Color,
    pub error_color: Color,
    pub code_color: Color,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            accent_color: Color::Cyan,
            success_color: Color::Green,
            error_color: Color::Red,
            code_color: Color::Magenta,
        }
    }
}

/// Write the status tail shared by several renderers: a checkmark for
/// complete items, a truncated error line for failed ones.
fn write_status(style: &RenderStyle, status: &ItemStatus, out: &mut dyn Write) -> io::Result<()> {
    match status {
        ItemStatus::Streaming => {}
        ItemStatus::Complete => {
            out.execute(SetForegroundColor(style.success_color))?
                .execute(Print(" ✓\n"))?
                .execute(ResetColor)?;
        }
        ItemStatus::Error { message } => {
            let display = if message.chars().count() > 60 {
                let head: String = message.chars().take(57).collect();
                format!("{}...", head)
            } else {
                message.clone()
            };
            out.execute(SetForegroundColor(style.error_color))?
                .execute(Print(format!(" ✗ {}\n", display)))?
                .execute(ResetColor)?;
        }
    }
    Ok(())
}

/// Markdown renderer with syntax-highlighted code blocks.
pub struct MarkdownRenderer {
    style: RenderStyle,
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
}

impl MarkdownRenderer {
    pub fn with_style(style: RenderStyle) -> Self {
        Self {
            style,
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
        }
    }

    /// Render markdown content line by line, buffering fenced code blocks.
    pub fn render_markdown(&self, content: &str, out: &mut dyn Write) -> io::Result<()> {
        let mut state = FenceState::default();
        for line in content.lines() {
            self.feed_line(&mut state, line, out)?;
        }
        self.finish(&mut state, out)
    }

    /// One line of input, fence-aware: fence markers toggle code buffering,
    /// buffered code renders when the fence closes.
    fn feed_line(&self, state: &mut FenceState, line: &str, out: &mut dyn Write) -> io::Result<()> {
        if let Some(rest) = line.strip_prefix("```") {
            if state.in_code_block {
                self.render_code_block(&state.lang, &state.code, out)?;
                state.code.clear();
                state.lang.clear();
                state.in_code_block = false;
            } else {
                state.in_code_block = true;
                state.lang = rest.trim().to_string();
            }
        } else if state.in_code_block {
            state.code.push_str(line);
            state.code.push('\n');
        } else {
            self.render_line(line, out)?;
        }
        Ok(())
    }

    /// Render an unterminated fence, if any, and reset the state.
    fn finish(&self, state: &mut FenceState, out: &mut dyn Write) -> io::Result<()> {
        if state.in_code_block && !state.code.is_empty() {
            self.render_code_block(&state.lang, &state.code, out)?;
        }
        *state = FenceState::default();
        Ok(())
    }

    fn render_line(&self, line: &str, out: &mut dyn Write) -> io::Result<()> {
        // Headers, any level, all render the same accent-bold way.
        let trimmed = line.trim_start_matches('#');
        if trimmed.len() < line.len() && trimmed.starts_with(' ') {
            out.execute(SetForegroundColor(self.style.accent_color))?
                .execute(SetAttribute(Attribute::Bold))?
                .execute(Print(trimmed.trim_start()))?
                .execute(SetAttribute(Attribute::Reset))?
                .execute(ResetColor)?
                .execute(Print("\n"))?;
            return Ok(());
        }

        if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
            out.execute(SetForegroundColor(Color::Yellow))?
                .execute(Print("• "))?
                .execute(ResetColor)?;
            self.render_inline(rest, out)?;
            out.execute(Print("\n"))?;
            return Ok(());
        }

        if let Some(rest) = line.strip_prefix("> ") {
            out.execute(SetForegroundColor(Color::DarkGrey))?
                .execute(Print("│ "))?
                .execute(ResetColor)?;
            self.render_inline(rest, out)?;
            out.execute(Print("\n"))?;
            return Ok(());
        }

        if line == "---" || line == "***" {
            out.execute(SetForegroundColor(Color::DarkGrey))?
                .execute(Print("─".repeat(40)))?
                .execute(ResetColor)?
                .execute(Print("\n"))?;
            return Ok(());
        }

        self.render_inline(line, out)?;
        out.execute(Print("\n"))?;
        Ok(())
    }

    /// Inline code and bold. Anything fancier passes through verbatim.
    fn render_inline(&self, text: &str, out: &mut dyn Write) -> io::Result<()> {
        let mut chars = text.chars().peekable();
        let mut buffer = String::new();

        while let Some(c) = chars.next() {
            match c {
                '`' => {
                    if !buffer.is_empty() {
                        out.execute(Print(&buffer))?;
                        buffer.clear();
                    }
                    let mut code = String::new();
                    for nc in chars.by_ref() {
                        if nc == '`' {
                            break;
                        }
                        code.push(nc);
                    }
                    out.execute(SetForegroundColor(self.style.code_color))?
                        .execute(Print(&code))?
                        .execute(ResetColor)?;
                }
                '*' if chars.peek() == Some(&'*') => {
                    chars.next();
                    if !buffer.is_empty() {
                        out.execute(Print(&buffer))?;
                        buffer.clear();
                    }
                    let mut bold = String::new();
                    while let Some(nc) = chars.next() {
                        if nc == '*' && chars.peek() == Some(&'*') {
                            chars.next();
                            break;
                        }
                        bold.push(nc);
                    }
                    out.execute(SetAttribute(Attribute::Bold))?
                        .execute(Print(&bold))?
                        .execute(SetAttribute(Attribute::Reset))?;
                }
                _ => buffer.push(c),
            }
        }

        if !buffer.is_empty() {
            out.execute(Print(&buffer))?;
        }
        Ok(())
    }

    fn render_code_block(&self, lang: &str, code: &str, out: &mut dyn Write) -> io::Result<()> {
        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| self.syntax_set.find_syntax_by_extension(lang))
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        let theme = &self.theme_set.themes["base16-ocean.dark"];
        let mut highlighter = HighlightLines::new(syntax, theme);

        out.execute(SetForegroundColor(Color::DarkGrey))?
            .execute(Print(format!(
                "┌── {}\n",
                if lang.is_empty() { "code" } else { lang }
            )))?
            .execute(ResetColor)?;

        for line in LinesWithEndings::from(code) {
            out.execute(SetForegroundColor(Color::DarkGrey))?
                .execute(Print("│ "))?
                .execute(ResetColor)?;
            match highlighter.highlight_line(line, &self.syntax_set) {
                Ok(ranges) => write!(out, "{}", as_24_bit_terminal_escaped(&ranges[..], false))?,
                Err(_) => write!(out, "{}", line)?,
            }
        }

        out.execute(SetForegroundColor(Color::DarkGrey))?
            .execute(Print("└──\n"))?
            .execute(ResetColor)?;
        Ok(())
    }
}

impl ItemRenderer for MarkdownRenderer {
    fn render(&self, item: &ChatItem, out: &mut dyn Write) -> io::Result<()> {
        self.render_markdown(item.text().unwrap_or_default(), out)?;
        if let ItemStatus::Error { .. } = item.status {
            write_status(&self.style, &item.status, out)?;
        }
        Ok(())
    }
}

/// Fence-tracking state shared by batch and streaming markdown rendering.
#[derive(Default)]
struct FenceState {
    in_code_block: bool,
    lang: String,
    code: String,
}

/// Line-buffered markdown rendering for live text streams.
///
/// Fragments arrive mid-line; text is buffered until a full line is
/// available, then rendered with the same rules as batch markdown, so
/// streamed output gets headers, bullets, and highlighted code blocks too.
pub struct StreamingMarkdown {
    renderer: MarkdownRenderer,
    line_buffer: String,
    state: FenceState,
}

impl StreamingMarkdown {
    pub fn new() -> Self {
        Self::with_style(RenderStyle::default())
    }

    pub fn with_style(style: RenderStyle) -> Self {
        Self {
            renderer: MarkdownRenderer::with_style(style),
            line_buffer: String::new(),
            state: FenceState::default(),
        }
    }

    /// Buffer an incoming fragment and render any complete lines.
    pub fn process(&mut self, text: &str, out: &mut dyn Write) -> io::Result<()> {
        self.line_buffer.push_str(text);
        while let Some(newline) = self.line_buffer.find('\n') {
            let line: String = self.line_buffer.drain(..=newline).collect();
            self.renderer
                .feed_line(&mut self.state, line.trim_end_matches('\n'), out)?;
        }
        out.flush()
    }

    /// Render any trailing partial line and reset for the next stream.
    pub fn flush(&mut self, out: &mut dyn Write) -> io::Result<()> {
        if !self.line_buffer.is_empty() {
            let line = std::mem::take(&mut self.line_buffer);
            self.renderer.feed_line(&mut self.state, &line, out)?;
        }
        self.renderer.finish(&mut self.state, out)?;
        out.flush()
    }
}

impl Default for StreamingMarkdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Tool-call renderer: one line of name plus args, then accumulated output.
pub struct ToolCallRenderer {
    style: RenderStyle,
}

impl ToolCallRenderer {
    pub fn with_style(style: RenderStyle) -> Self {
        Self { style }
    }
}

impl ItemRenderer for ToolCallRenderer {
    fn render(&self, item: &ChatItem, out: &mut dyn Write) -> io::Result<()> {
        let ItemPayload::Tool(tool) = &item.payload else {
            return Ok(());
        };

        out.execute(SetForegroundColor(Color::Yellow))?
            .execute(Print("🔧 "))?
            .execute(Print(&tool.tool_name))?
            .execute(ResetColor)?;

        if let Some(args) = &tool.args {
            let compact = args.to_string();
            let display = if compact.chars().count() > 80 {
                let head: String = compact.chars().take(77).collect();
                format!("{}...", head)
            } else {
                compact
            };
            out.execute(Print(" "))?
                .execute(SetAttribute(Attribute::Dim))?
                .execute(Print(display))?
                .execute(SetAttribute(Attribute::Reset))?;
        }
        write_status(&self.style, &item.status, out)?;
        if !item.is_terminal() {
            out.execute(Print("\n"))?;
        }

        if !tool.output.is_empty() {
            out.execute(SetAttribute(Attribute::Dim))?;
            for line in tool.output.lines().take(12) {
                out.execute(Print(format!("  {}\n", line)))?;
            }
            out.execute(SetAttribute(Attribute::Reset))?;
        }
        Ok(())
    }
}

/// Nested sub-agent transcript: header with the agent name, indented body.
pub struct SubAgentRenderer {
    style: RenderStyle,
}

impl SubAgentRenderer {
    pub fn with_style(style: RenderStyle) -> Self {
        Self { style }
    }
}

impl ItemRenderer for SubAgentRenderer {
    fn render(&self, item: &ChatItem, out: &mut dyn Write) -> io::Result<()> {
        let agent = item.agent.as_deref().unwrap_or("sub-agent");
        out.execute(SetForegroundColor(Color::Magenta))?
            .execute(SetAttribute(Attribute::Bold))?
            .execute(Print(agent))?
            .execute(Print(":"))?
            .execute(SetAttribute(Attribute::Reset))?
            .execute(ResetColor)?
            .execute(Print("\n"))?;

        for line in item.text().unwrap_or_default().lines() {
            out.execute(Print(format!("  {}\n", line)))?;
        }
        if let ItemStatus::Error { .. } = item.status {
            write_status(&self.style, &item.status, out)?;
        }
        Ok(())
    }
}

/// Feed renderer: one bullet per entry.
pub struct FeedRenderer {
    style: RenderStyle,
}

impl FeedRenderer {
    pub fn with_style(style: RenderStyle) -> Self {
        Self { style }
    }
}

impl ItemRenderer for FeedRenderer {
    fn render(&self, item: &ChatItem, out: &mut dyn Write) -> io::Result<()> {
        let ItemPayload::Feed(entries) = &item.payload else {
            return Ok(());
        };
        for entry in entries {
            out.execute(SetForegroundColor(self.style.accent_color))?
                .execute(Print("• "))?
                .execute(ResetColor)?;
            if let Some(title) = &entry.title {
                out.execute(SetAttribute(Attribute::Bold))?
                    .execute(Print(title))?
                    .execute(SetAttribute(Attribute::Reset))?
                    .execute(Print(" — "))?;
            }
            match entry.body.as_str() {
                Some(text) => out.execute(Print(text))?,
                None => out.execute(Print(entry.body.to_string()))?,
            };
            out.execute(Print("\n"))?;
        }
        Ok(())
    }
}

/// Explicit fallback for unrecognized component kinds.
///
/// Shows the declared tag and the raw payload; it must never fail, whatever
/// future types show up on the wire.
pub struct FallbackRenderer {
    style: RenderStyle,
}

impl FallbackRenderer {
    pub fn with_style(style: RenderStyle) -> Self {
        Self { style }
    }
}

impl ItemRenderer for FallbackRenderer {
    fn render(&self, item: &ChatItem, out: &mut dyn Write) -> io::Result<()> {
        out.execute(SetForegroundColor(self.style.accent_color))?
            .execute(Print(format!("⚠ unrendered component '{}'\n", item.component)))?
            .execute(ResetColor)?;

        let raw = match &item.payload {
            ItemPayload::Raw(value) => value.clone(),
            other => serde_json::to_value(other).unwrap_or_default(),
        };
        let pretty = serde_json::to_string_pretty(&raw).unwrap_or_else(|_| raw.to_string());
        out.execute(SetAttribute(Attribute::Dim))?;
        for line in pretty.lines() {
            out.execute(Print(format!("  {}\n", line)))?;
        }
        out.execute(SetAttribute(Attribute::Reset))?;
        Ok(())
    }
}
