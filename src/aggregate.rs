use tracing::debug;

use crate::error::StoreResult;
use crate::markers::Markers;
use crate::parser::{AggregateDoc, ContentBlock};
use crate::store::DocumentStore;

pub const UPSERT_NOTE: &str = "Add list content to list";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Stored text already matched; nothing written.
    Unchanged,
    /// Section added or replaced.
    Written,
    /// Block was empty and its old section was removed.
    Removed,
}

/// Fold one content block into the aggregate page for its list.
pub fn upsert<S: DocumentStore + ?Sized>(
    store: &S,
    markers: &Markers,
    block: &ContentBlock,
) -> StoreResult<UpsertOutcome> {
    let title = markers.aggregate_title(&block.list_name);
    let heading = markers.section_heading(&block.source_title);

    let before = store.fetch(&title)?;
    let mut doc = AggregateDoc::from_text(&before);
    let found = doc.upsert(markers, &heading, &block.lines);
    let after = doc.to_text();

    if after == before {
        debug!(list = %title, section = %heading, found, "aggregate unchanged");
        return Ok(UpsertOutcome::Unchanged);
    }

    store.save(&title, &after, UPSERT_NOTE)?;
    debug!(list = %title, section = %heading, found, lines = block.lines.len(), "aggregate updated");

    Ok(if block.lines.is_empty() {
        UpsertOutcome::Removed
    } else {
        UpsertOutcome::Written
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::DEFAULT_PREFIX;
    use crate::store::MemoryStore;

    fn block(source: &str, lines: &[&str]) -> ContentBlock {
        ContentBlock {
            list_name: "Foo".into(),
            source_title: source.into(),
            lines: lines.iter().map(|l| l.to_string()).collect(),
        }
    }

    #[test]
    fn creates_aggregate_page() {
        let m = Markers::new(DEFAULT_PREFIX).unwrap();
        let store = MemoryStore::new();
        let out = upsert(&store, &m, &block("T", &["* a", "* b"])).unwrap();
        assert_eq!(out, UpsertOutcome::Written);
        assert_eq!(store.text("ListGenBot Foo").unwrap(), "==T==\n* a\n* b");
        assert_eq!(store.edits()[0].note, UPSERT_NOTE);
    }

    #[test]
    fn second_identical_upsert_skips_write() {
        let m = Markers::new(DEFAULT_PREFIX).unwrap();
        let store = MemoryStore::with_pages([("ListGenBot Foo", "==S==\ns1")]);
        let b = block("T", &["* a"]);
        upsert(&store, &m, &b).unwrap();
        let once = store.text("ListGenBot Foo").unwrap();
        assert_eq!(upsert(&store, &m, &b).unwrap(), UpsertOutcome::Unchanged);
        assert_eq!(store.text("ListGenBot Foo").unwrap(), once);
        assert_eq!(store.edits().len(), 1);
    }

    #[test]
    fn empty_block_removes_section() {
        let m = Markers::new(DEFAULT_PREFIX).unwrap();
        let store = MemoryStore::with_pages([("ListGenBot Foo", "==A==\na\n==T==\nt\n==B==\nb")]);
        let out = upsert(&store, &m, &block("T", &[])).unwrap();
        assert_eq!(out, UpsertOutcome::Removed);
        assert_eq!(store.text("ListGenBot Foo").unwrap(), "==A==\na\n==B==\nb");
    }

    #[test]
    fn empty_block_without_section_writes_nothing() {
        let m = Markers::new(DEFAULT_PREFIX).unwrap();
        let store = MemoryStore::new();
        assert_eq!(upsert(&store, &m, &block("T", &[])).unwrap(), UpsertOutcome::Unchanged);
        assert!(store.edits().is_empty());
    }
}
