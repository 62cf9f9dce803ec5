//! Expansion of list directives embedded in page text.
//!
//! Rendering runs in three steps: find directive spans with exact byte
//! offsets, compute each replacement body from the aggregate page, then
//! stitch the page back together. Text outside the spans is untouched.

use std::collections::HashMap;
use std::ops::Range;

use tracing::{debug, warn};

use crate::error::StoreResult;
use crate::markers::Markers;
use crate::parser::AggregateDoc;
use crate::store::DocumentStore;

pub const RENDER_NOTE: &str = "Render lists";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderMode {
    /// Aggregate lines in page order, headings turned into linked level-3 headings.
    Sectioned,
    /// Every non-heading line, sorted.
    Alphabetical,
    /// Accepted by the grammar but renders nothing.
    Other(String),
}

impl RenderMode {
    pub fn parse(mode: &str) -> Self {
        match mode {
            "Sectioned" => RenderMode::Sectioned,
            "Alphabetical" => RenderMode::Alphabetical,
            other => RenderMode::Other(other.to_string()),
        }
    }
}

/// One start/end marker pair found in a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderDirective {
    pub mode: RenderMode,
    pub list_name: String,
    pub open_mode: String,
    pub close_mode: String,
    /// Byte range of the open marker.
    pub open: Range<usize>,
    /// Byte range of the close marker.
    pub close: Range<usize>,
}

impl RenderDirective {
    /// Open and close markers must name the same mode.
    pub fn is_valid(&self) -> bool {
        self.open_mode == self.close_mode
    }

    /// Whole span replaced by a render, markers included.
    pub fn span(&self) -> Range<usize> {
        self.open.start..self.close.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    pub rendered: usize,
    pub malformed: usize,
}

/// Pair every render-start marker with the first render-end marker that
/// begins on a later line. Pairs never overlap; a start with no later end
/// is left alone.
pub fn find_directives(markers: &Markers, text: &str) -> Vec<RenderDirective> {
    let mut directives = Vec::new();
    let mut from = 0;

    while let Some(open) = markers.render_start_at(text, from) {
        let Some(newline) = text[open.end..].find('\n') else {
            break;
        };
        let Some(close) = markers.render_end_at(text, open.end + newline + 1) else {
            break;
        };

        from = close.end;
        directives.push(RenderDirective {
            mode: RenderMode::parse(&open.mode),
            list_name: open.list_name.unwrap_or_default(),
            open_mode: open.mode,
            close_mode: close.mode,
            open: open.start..open.end,
            close: close.start..close.end,
        });
    }

    directives
}

/// Body lines for `mode` computed from the aggregate page's lines.
pub fn render_body(markers: &Markers, mode: &RenderMode, aggregate: &[String]) -> Vec<String> {
    match mode {
        RenderMode::Sectioned => aggregate
            .iter()
            .map(|line| match markers.heading_text(line) {
                Some(title) => format!("===([[{}]])===", title),
                None => line.clone(),
            })
            .collect(),
        RenderMode::Alphabetical => {
            let mut lines: Vec<String> = aggregate
                .iter()
                .filter(|l| !markers.is_heading(l))
                .cloned()
                .collect();
            lines.sort();
            lines
        }
        RenderMode::Other(_) => Vec::new(),
    }
}

/// Expand every valid directive in `text` with the current aggregate pages.
///
/// Mismatched directives are kept verbatim and counted in `malformed`.
pub fn render<S: DocumentStore + ?Sized>(
    store: &S,
    markers: &Markers,
    text: &str,
) -> StoreResult<Rendered> {
    let directives = find_directives(markers, text);
    let mut aggregates: HashMap<String, Vec<String>> = HashMap::new();
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    let mut rendered = 0;
    let mut malformed = 0;

    for d in &directives {
        let span = d.span();
        out.push_str(&text[cursor..span.start]);
        cursor = span.end;

        if !d.is_valid() {
            warn!(
                list = %d.list_name,
                open = %d.open_mode,
                close = %d.close_mode,
                "mismatched list directive left as is"
            );
            out.push_str(&text[span]);
            malformed += 1;
            continue;
        }

        if !aggregates.contains_key(&d.list_name) {
            let page = store.fetch(&markers.aggregate_title(&d.list_name))?;
            let lines = AggregateDoc::from_text(&page).lines().to_vec();
            aggregates.insert(d.list_name.clone(), lines);
        }
        let aggregate = aggregates.get(&d.list_name).map(Vec::as_slice).unwrap_or(&[]);
        let body = render_body(markers, &d.mode, aggregate);
        debug!(list = %d.list_name, mode = ?d.mode, lines = body.len(), "rendered directive");

        out.push_str(&text[d.open.clone()]);
        out.push('\n');
        out.push_str(&body.join("\n"));
        out.push('\n');
        out.push_str(&text[d.close.clone()]);
        rendered += 1;
    }
    out.push_str(&text[cursor..]);

    Ok(Rendered {
        text: out,
        rendered,
        malformed,
    })
}
