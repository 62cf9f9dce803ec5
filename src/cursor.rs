use tracing::debug;

use crate::error::StoreResult;
use crate::store::DocumentStore;

pub const CURSOR_NOTE: &str = "Store new page from last execution.";

/// Resumption point of the sweep, stored as the first line of one page.
/// Empty means "start from the beginning of the corpus".
pub struct Cursor<'a> {
    title: &'a str,
}

impl<'a> Cursor<'a> {
    pub fn new(title: &'a str) -> Self {
        Cursor { title }
    }

    pub fn title(&self) -> &str {
        self.title
    }

    pub fn load<S: DocumentStore + ?Sized>(&self, store: &S) -> StoreResult<String> {
        let text = store.fetch(self.title)?;
        Ok(text.split('\n').next().unwrap_or_default().to_string())
    }

    /// Write `value`; skipped when the page already holds exactly that text.
    pub fn save<S: DocumentStore + ?Sized>(&self, store: &S, value: &str) -> StoreResult<bool> {
        if store.fetch(self.title)? == value {
            debug!(cursor = value, "cursor unchanged");
            return Ok(false);
        }
        store.save(self.title, value, CURSOR_NOTE)?;
        Ok(true)
    }
}

/// Next cursor value after a batch: wrap to the start on a short batch,
/// otherwise resume from the last title seen.
pub fn advance(titles: &[String], batch_size: usize) -> String {
    if titles.len() < batch_size {
        String::new()
    } else {
        titles.last().cloned().unwrap_or_default()
    }
}
