//! Collaborators the engine talks to: page text storage and title enumeration.
//!
//! Every backend reads missing pages as empty text and replaces the full
//! text on save.

pub mod memory;
pub mod sqlite;
pub mod wiki;

use crate::error::StoreResult;

pub use memory::{DryRun, MemoryStore};
pub use sqlite::SqliteStore;
pub use wiki::WikiClient;

pub trait DocumentStore {
    fn fetch(&self, title: &str) -> StoreResult<String>;

    /// Replace the full text of `title`. `note` is the change summary.
    fn save(&self, title: &str, text: &str, note: &str) -> StoreResult<()>;
}

pub trait PageEnumerator {
    /// Up to `limit` titles in lexicographic order, starting at `from`
    /// (inclusive when it exists). An empty `from` starts at the beginning.
    fn list_from(&self, from: &str, limit: usize) -> StoreResult<Vec<String>>;
}

/// A backend that can both store pages and enumerate them.
pub trait Backend: DocumentStore + PageEnumerator {}

impl<T: DocumentStore + PageEnumerator> Backend for T {}
