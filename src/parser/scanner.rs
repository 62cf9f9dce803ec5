use crate::markers::Markers;

/// Lines demarcated in one source page for one list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentBlock {
    pub list_name: String,
    pub source_title: String,
    pub lines: Vec<String>,
}

/// Non-fatal problems found while scanning a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanIssue {
    /// A start marker appeared inside an open block; the open block was dropped.
    NestedStart { discarded: String, started: String },
    /// The page ended inside a block; the block was dropped.
    Unterminated { list_name: String },
}

impl std::fmt::Display for ScanIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanIssue::NestedStart { discarded, started } => write!(
                f,
                "block '{}' opened before '{}' was closed; '{}' discarded",
                started, discarded, discarded
            ),
            ScanIssue::Unterminated { list_name } => {
                write!(f, "block '{}' never closed, discarded", list_name)
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct Scan {
    pub blocks: Vec<ContentBlock>,
    pub issues: Vec<ScanIssue>,
}

enum State {
    Outside,
    InList { list_name: String, lines: Vec<String> },
}

/// Walk the page line by line and collect every closed content block.
///
/// Heading lines inside a block are skipped. Blocks are only emitted once
/// their end marker is seen.
pub fn scan_page(markers: &Markers, title: &str, text: &str) -> Scan {
    let mut scan = Scan::default();
    let mut state = State::Outside;

    for line in text.split('\n') {
        state = match state {
            State::Outside => match markers.content_start(line) {
                Some(name) => State::InList {
                    list_name: name.to_string(),
                    lines: Vec::new(),
                },
                None => State::Outside,
            },
            State::InList { list_name, mut lines } => {
                if markers.is_content_end(line) {
                    scan.blocks.push(ContentBlock {
                        list_name,
                        source_title: title.to_string(),
                        lines,
                    });
                    State::Outside
                } else if let Some(name) = markers.content_start(line) {
                    scan.issues.push(ScanIssue::NestedStart {
                        discarded: list_name,
                        started: name.to_string(),
                    });
                    State::InList {
                        list_name: name.to_string(),
                        lines: Vec::new(),
                    }
                } else {
                    if !markers.is_heading(line) {
                        lines.push(line.to_string());
                    }
                    State::InList { list_name, lines }
                }
            }
        };
    }

    if let State::InList { list_name, .. } = state {
        scan.issues.push(ScanIssue::Unterminated { list_name });
    }

    scan
}
