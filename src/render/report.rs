//! Structured report rendering.
//!
//! A report item carries named sections. Each well-known section name has a
//! dedicated renderer; anything else falls back to a raw dump so a report
//! with an unexpected section still displays in full.

use std::collections::HashMap;
use std::io::{self, Write};

use crossterm::{
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    ExecutableCommand,
};
use serde_json::Value;

use crate::state::{ChatItem, ItemPayload, ReportSection};

use super::components::RenderStyle;
use super::registry::{ItemRenderer, SectionRenderer};

/// Renderer for report items. Owns its own section dispatch table.
pub struct ReportRenderer {
    style: RenderStyle,
    sections: HashMap<String, Box<dyn SectionRenderer>>,
    fallback: Box<dyn SectionRenderer>,
}

impl ReportRenderer {
    pub fn with_style(style: RenderStyle) -> Self {
        let mut sections: HashMap<String, Box<dyn SectionRenderer>> = HashMap::new();
        sections.insert("summary".to_string(), Box::new(SummarySection));
        sections.insert("findings".to_string(), Box::new(FindingsSection));
        sections.insert("metrics".to_string(), Box::new(MetricsSection));
        Self {
            style,
            sections,
            fallback: Box::new(RawSection),
        }
    }

    fn section_renderer(&self, name: &str) -> &dyn SectionRenderer {
        self.sections
            .get(name)
            .unwrap_or(&self.fallback)
            .as_ref()
    }

    fn write_heading(&self, name: &str, out: &mut dyn Write) -> io::Result<()> {
        out.execute(SetForegroundColor(self.style.accent_color))?
            .execute(SetAttribute(Attribute::Bold))?
            .execute(Print(name))?
            .execute(SetAttribute(Attribute::Reset))?
            .execute(ResetColor)?
            .execute(Print("\n"))?;
        Ok(())
    }
}

impl ItemRenderer for ReportRenderer {
    fn render(&self, item: &ChatItem, out: &mut dyn Write) -> io::Result<()> {
        let ItemPayload::Report(sections) = &item.payload else {
            return Ok(());
        };
        for section in sections {
            self.write_heading(&section.name, out)?;
            self.section_renderer(&section.name).render(section, out)?;
        }
        Ok(())
    }
}

/// Free-text summary body.
struct SummarySection;

impl SectionRenderer for SummarySection {
    fn render(&self, section: &ReportSection, out: &mut dyn Write) -> io::Result<()> {
        match &section.body {
            Value::String(text) => writeln!(out, "{}", text)?,
            other => writeln!(out, "{}", other)?,
        }
        Ok(())
    }
}

/// Array of findings, one bullet each. Entries may be plain strings or
/// objects with a `title` field.
struct FindingsSection;

impl SectionRenderer for FindingsSection {
    fn render(&self, section: &ReportSection, out: &mut dyn Write) -> io::Result<()> {
        let Value::Array(entries) = &section.body else {
            return RawSection.render(section, out);
        };
        for entry in entries {
            let line = match entry {
                Value::String(s) => s.clone(),
                Value::Object(map) => map
                    .get("title")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| entry.to_string()),
                other => other.to_string(),
            };
            out.execute(SetForegroundColor(Color::Yellow))?
                .execute(Print("• "))?
                .execute(ResetColor)?
                .execute(Print(format!("{}\n", line)))?;
        }
        Ok(())
    }
}

/// Key/value metric rows from an object body.
struct MetricsSection;

impl SectionRenderer for MetricsSection {
    fn render(&self, section: &ReportSection, out: &mut dyn Write) -> io::Result<()> {
        let Value::Object(map) = &section.body else {
            return RawSection.render(section, out);
        };
        for (key, value) in map {
            out.execute(SetAttribute(Attribute::Dim))?
                .execute(Print(format!("  {}: ", key)))?
                .execute(SetAttribute(Attribute::Reset))?;
            match value {
                Value::String(s) => writeln!(out, "{}", s)?,
                other => writeln!(out, "{}", other)?,
            }
        }
        Ok(())
    }
}

/// Section fallback: pretty-printed body under the heading.
struct RawSection;

impl SectionRenderer for RawSection {
    fn render(&self, section: &ReportSection, out: &mut dyn Write) -> io::Result<()> {
        let pretty = serde_json::to_string_pretty(&section.body)
            .unwrap_or_else(|_| section.body.to_string());
        out.execute(SetAttribute(Attribute::Dim))?;
        for line in pretty.lines() {
            writeln!(out, "  {}", line)?;
        }
        out.execute(SetAttribute(Attribute::Reset))?;
        Ok(())
    }
}
