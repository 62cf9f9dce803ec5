use std::ops::Range;

use crate::markers::Markers;

/// One `==Title==` section of an aggregate page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub heading: String,
    pub body: Vec<String>,
}

/// Aggregate page as a line sequence, keyed by section heading lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateDoc {
    lines: Vec<String>,
}

impl AggregateDoc {
    /// Empty text is zero lines, not one empty line.
    pub fn from_text(text: &str) -> Self {
        let lines = if text.is_empty() {
            Vec::new()
        } else {
            text.split('\n').map(str::to_string).collect()
        };
        AggregateDoc { lines }
    }

    pub fn to_text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Line range of the first section whose heading equals `heading`.
    ///
    /// The section runs up to the next heading line of any level, or to the
    /// end of the page.
    pub fn locate(&self, markers: &Markers, heading: &str) -> Option<Range<usize>> {
        let start = self.lines.iter().position(|l| l == heading)?;
        let end = self.lines[start + 1..]
            .iter()
            .position(|l| markers.is_heading(l))
            .map(|offset| start + 1 + offset)
            .unwrap_or(self.lines.len());
        Some(start..end)
    }

    /// Replace the section under `heading` with `body`.
    ///
    /// An existing section is removed wherever it sits; non-empty bodies are
    /// appended at the end. Empty bodies leave the section deleted. Returns
    /// whether a previous section was found.
    pub fn upsert(&mut self, markers: &Markers, heading: &str, body: &[String]) -> bool {
        let found = match self.locate(markers, heading) {
            Some(range) => {
                self.lines.drain(range);
                true
            }
            None => false,
        };

        if !body.is_empty() {
            self.lines.push(heading.to_string());
            self.lines.extend(body.iter().cloned());
        }

        found
    }

    /// Sections in page order. Lines before the first heading are not part
    /// of any section.
    pub fn sections(&self, markers: &Markers) -> Vec<Section> {
        let mut sections: Vec<Section> = Vec::new();
        for line in &self.lines {
            if markers.is_heading(line) {
                sections.push(Section {
                    heading: line.clone(),
                    body: Vec::new(),
                });
            } else if let Some(current) = sections.last_mut() {
                current.body.push(line.clone());
            }
        }
        sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::DEFAULT_PREFIX;

    fn markers() -> Markers {
        Markers::new(DEFAULT_PREFIX).unwrap()
    }

    fn body(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn empty_text_has_no_lines() {
        assert!(AggregateDoc::from_text("").lines().is_empty());
        assert_eq!(AggregateDoc::from_text("a\n").lines().len(), 2);
    }

    #[test]
    fn upsert_into_empty_page() {
        let m = markers();
        let mut doc = AggregateDoc::from_text("");
        let found = doc.upsert(&m, "==T==", &body(&["x", "y"]));
        assert!(!found);
        assert_eq!(doc.to_text(), "==T==\nx\ny");
    }

    #[test]
    fn replace_moves_section_to_end() {
        let m = markers();
        let mut doc = AggregateDoc::from_text("==A==\na1\n==B==\nb1\n==C==\nc1");
        assert!(doc.upsert(&m, "==A==", &body(&["a2"])));
        assert_eq!(doc.to_text(), "==B==\nb1\n==C==\nc1\n==A==\na2");
    }

    #[test]
    fn first_section_at_line_zero_is_found() {
        let m = markers();
        let doc = AggregateDoc::from_text("==A==\na1\n==B==\nb1");
        assert_eq!(doc.locate(&m, "==A=="), Some(0..2));
    }

    #[test]
    fn last_section_runs_to_end() {
        let m = markers();
        let doc = AggregateDoc::from_text("==A==\na1\n==B==\nb1\nb2");
        assert_eq!(doc.locate(&m, "==B=="), Some(2..5));
        assert_eq!(doc.locate(&m, "==Z=="), None);
    }

    #[test]
    fn empty_body_removes_section_only() {
        let m = markers();
        let mut doc = AggregateDoc::from_text("intro\n==A==\na1\n==B==\nb1\n==C==\nc1");
        doc.upsert(&m, "==B==", &[]);
        assert_eq!(doc.to_text(), "intro\n==A==\na1\n==C==\nc1");
    }

    #[test]
    fn empty_body_for_missing_section_is_noop() {
        let m = markers();
        let mut doc = AggregateDoc::from_text("==A==\na1");
        assert!(!doc.upsert(&m, "==Z==", &[]));
        assert_eq!(doc.to_text(), "==A==\na1");
    }

    #[test]
    fn upsert_is_idempotent() {
        let m = markers();
        let mut doc = AggregateDoc::from_text("==A==\na1\n==B==\nb1");
        doc.upsert(&m, "==A==", &body(&["new"]));
        let once = doc.to_text();
        doc.upsert(&m, "==A==", &body(&["new"]));
        assert_eq!(doc.to_text(), once);
    }

    #[test]
    fn title_with_equals_is_not_a_boundary() {
        let m = markers();
        assert!(!m.is_heading("==A=B=="));
        let mut doc = AggregateDoc::from_text("==A==\na1\n==A=B==\nab1\n==C==\nc1");
        assert_eq!(doc.locate(&m, "==A=="), Some(0..4));
        assert_eq!(doc.locate(&m, "==A=B=="), Some(2..4));

        // Replacing A takes the A=B section along with it.
        assert!(doc.upsert(&m, "==A==", &body(&["a2"])));
        assert_eq!(doc.to_text(), "==C==\nc1\n==A==\na2");
    }

    #[test]
    fn sections_skip_preamble() {
        let m = markers();
        let doc = AggregateDoc::from_text("preamble\n==A==\na1\n==B==");
        let sections = doc.sections(&m);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].body, body(&["a1"]));
        assert!(sections[1].body.is_empty());
    }
}
