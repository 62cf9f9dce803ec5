use std::cell::RefCell;
use std::collections::BTreeMap;

use tracing::info;

use super::{DocumentStore, PageEnumerator};
use crate::error::StoreResult;

/// One recorded save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedEdit {
    pub title: String,
    pub note: String,
}

/// In-memory corpus keyed by title.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pages: RefCell<BTreeMap<String, String>>,
    edits: RefCell<Vec<SavedEdit>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_pages<I, T, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = (T, S)>,
        T: Into<String>,
        S: Into<String>,
    {
        let store = Self::new();
        store
            .pages
            .borrow_mut()
            .extend(pages.into_iter().map(|(t, s)| (t.into(), s.into())));
        store
    }

    pub fn text(&self, title: &str) -> Option<String> {
        self.pages.borrow().get(title).cloned()
    }

    pub fn edits(&self) -> Vec<SavedEdit> {
        self.edits.borrow().clone()
    }
}

impl DocumentStore for MemoryStore {
    fn fetch(&self, title: &str) -> StoreResult<String> {
        Ok(self.text(title).unwrap_or_default())
    }

    fn save(&self, title: &str, text: &str, note: &str) -> StoreResult<()> {
        self.pages
            .borrow_mut()
            .insert(title.to_string(), text.to_string());
        self.edits.borrow_mut().push(SavedEdit {
            title: title.to_string(),
            note: note.to_string(),
        });
        Ok(())
    }
}

impl PageEnumerator for MemoryStore {
    fn list_from(&self, from: &str, limit: usize) -> StoreResult<Vec<String>> {
        Ok(self
            .pages
            .borrow()
            .keys()
            .filter(|t| t.as_str() >= from)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Wraps a backend so saves land in an in-memory overlay instead.
///
/// Reads see earlier overlay writes, so a dry run computes the same edits a
/// real run would.
pub struct DryRun<'a, B: ?Sized> {
    inner: &'a B,
    overlay: MemoryStore,
}

impl<'a, B: ?Sized> DryRun<'a, B> {
    pub fn new(inner: &'a B) -> Self {
        DryRun {
            inner,
            overlay: MemoryStore::new(),
        }
    }

    /// Edits that would have been made.
    pub fn edits(&self) -> Vec<SavedEdit> {
        self.overlay.edits()
    }
}

impl<B: DocumentStore + ?Sized> DocumentStore for DryRun<'_, B> {
    fn fetch(&self, title: &str) -> StoreResult<String> {
        match self.overlay.text(title) {
            Some(text) => Ok(text),
            None => self.inner.fetch(title),
        }
    }

    fn save(&self, title: &str, text: &str, note: &str) -> StoreResult<()> {
        info!(title, note, bytes = text.len(), "dry run: skipping save");
        self.overlay.save(title, text, note)
    }
}

impl<B: PageEnumerator + ?Sized> PageEnumerator for DryRun<'_, B> {
    fn list_from(&self, from: &str, limit: usize) -> StoreResult<Vec<String>> {
        self.inner.list_from(from, limit)
    }
}
