use regex::Regex;

use crate::error::EngineError;

pub const DEFAULT_PREFIX: &str = "ListGenBot";

/// A render-start or render-end marker found in page text, with byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerMatch {
    pub start: usize,
    pub end: usize,
    pub mode: String,
    pub list_name: Option<String>,
}

/// Compiled marker grammar for one marker prefix.
///
/// Built once per run and handed to the scanner, aggregator and renderer.
#[derive(Debug, Clone)]
pub struct Markers {
    prefix: String,
    content_start: Regex,
    content_end: Regex,
    render_start: Regex,
    render_end: Regex,
    heading: Regex,
}

impl Markers {
    pub fn new(prefix: &str) -> Result<Self, EngineError> {
        let p = regex::escape(prefix);
        Ok(Markers {
            prefix: prefix.to_string(),
            content_start: Regex::new(&format!(r"\{{\{{{p}-SourceStart\|([^{{}}]+)\}}\}}"))?,
            content_end: Regex::new(&format!(r"\{{\{{{p}-SourceEnd\}}\}}"))?,
            render_start: Regex::new(&format!(
                r"\{{\{{{p}-List([^|{{}}]*)Start\|([^{{}}]+)\}}\}}"
            ))?,
            render_end: Regex::new(&format!(r"\{{\{{{p}-List([^|{{}}]*)End\}}\}}"))?,
            heading: Regex::new(r"^(=+)([^=]*)(=+)[ ]?$")?,
        })
    }

    /// List name when the line opens a content block.
    pub fn content_start<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.content_start
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    pub fn is_content_end(&self, line: &str) -> bool {
        self.content_end.is_match(line)
    }

    pub fn is_heading(&self, line: &str) -> bool {
        self.heading.is_match(line)
    }

    /// Title text between the `=` runs of a heading line.
    pub fn heading_text<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.heading
            .captures(line)
            .and_then(|caps| caps.get(2))
            .map(|m| m.as_str())
    }

    /// First render-start marker at or after byte offset `from`.
    pub fn render_start_at(&self, text: &str, from: usize) -> Option<MarkerMatch> {
        let caps = self.render_start.captures_at(text, from)?;
        let whole = caps.get(0)?;
        Some(MarkerMatch {
            start: whole.start(),
            end: whole.end(),
            mode: caps[1].to_string(),
            list_name: Some(caps[2].to_string()),
        })
    }

    /// First render-end marker at or after byte offset `from`.
    pub fn render_end_at(&self, text: &str, from: usize) -> Option<MarkerMatch> {
        let caps = self.render_end.captures_at(text, from)?;
        let whole = caps.get(0)?;
        Some(MarkerMatch {
            start: whole.start(),
            end: whole.end(),
            mode: caps[1].to_string(),
            list_name: None,
        })
    }

    /// Title of the aggregate page that stores `list_name`.
    pub fn aggregate_title(&self, list_name: &str) -> String {
        format!("{} {}", self.prefix, list_name)
    }

    pub fn section_heading(&self, source_title: &str) -> String {
        format!("=={}==", source_title)
    }
}
