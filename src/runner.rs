use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::aggregate::{self, UpsertOutcome};
use crate::config::Settings;
use crate::cursor::{self, Cursor};
use crate::error::EngineError;
use crate::markers::Markers;
use crate::parser::{scan_page, ScanIssue};
use crate::render::{self, RENDER_NOTE};
use crate::store::{Backend, DocumentStore};

/// What happened to one page.
#[derive(Debug, Default)]
pub struct PageReport {
    pub blocks: usize,
    pub aggregate_writes: usize,
    pub issues: Vec<ScanIssue>,
    pub rendered: usize,
    pub malformed: usize,
    pub saved: bool,
}

/// Totals for one batch.
#[derive(Debug)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub start_cursor: String,
    pub pages: usize,
    pub blocks: usize,
    pub aggregate_writes: usize,
    pub pages_saved: usize,
    pub malformed: usize,
    pub scan_issues: usize,
    pub next_cursor: String,
}

impl BatchReport {
    pub fn print(&self) {
        println!(
            "Batch from {:?} at {}: {} pages, {} blocks, {} list updates, {} pages re-rendered.",
            self.start_cursor,
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.pages,
            self.blocks,
            self.aggregate_writes,
            self.pages_saved,
        );
        if self.malformed > 0 || self.scan_issues > 0 {
            println!(
                "Skipped {} mismatched directives, {} broken source blocks.",
                self.malformed, self.scan_issues
            );
        }
        if self.next_cursor.is_empty() {
            println!("Reached the end of the corpus; next run starts from the beginning.");
        } else {
            println!("Next run starts at {:?}.", self.next_cursor);
        }
    }
}

/// Drives one bounded sweep over the corpus per call.
pub struct BatchRunner {
    markers: Markers,
    batch_size: usize,
    cursor_title: String,
    progress: bool,
}

impl BatchRunner {
    pub fn new(settings: &Settings, markers: Markers) -> Self {
        BatchRunner {
            markers,
            batch_size: settings.batch_size,
            cursor_title: settings.cursor_title.clone(),
            progress: false,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn cursor(&self) -> Cursor<'_> {
        Cursor::new(&self.cursor_title)
    }

    /// Scan `title`, fold its blocks into their lists, then re-render the
    /// page's own directives against the updated lists.
    pub fn process_page<S: DocumentStore + ?Sized>(
        &self,
        store: &S,
        title: &str,
    ) -> Result<PageReport, EngineError> {
        let mut report = PageReport::default();

        let text = store.fetch(title)?;
        let scan = scan_page(&self.markers, title, &text);
        for issue in &scan.issues {
            warn!(page = title, "{}", issue);
        }
        report.blocks = scan.blocks.len();
        report.issues = scan.issues;

        for block in &scan.blocks {
            if aggregate::upsert(store, &self.markers, block)? != UpsertOutcome::Unchanged {
                report.aggregate_writes += 1;
            }
        }

        // The page may itself be one of the aggregates just written.
        let current = store.fetch(title)?;
        let rendered = render::render(store, &self.markers, &current)?;
        report.rendered = rendered.rendered;
        report.malformed = rendered.malformed;
        if rendered.text != current {
            store.save(title, &rendered.text, RENDER_NOTE)?;
            report.saved = true;
        }

        Ok(report)
    }

    /// Process the next batch and move the cursor.
    ///
    /// Any store failure aborts before the cursor is written, so the same
    /// batch is retried on the next call.
    pub fn run_once<B: Backend + ?Sized>(&self, backend: &B) -> Result<BatchReport, EngineError> {
        let started_at = Utc::now();
        let cursor = self.cursor();
        let start = cursor.load(backend)?;
        let titles = backend.list_from(&start, self.batch_size)?;
        info!(
            "Processing {} pages from {:?} (batch size {})",
            titles.len(),
            start,
            self.batch_size
        );

        let pb = if self.progress {
            ProgressBar::new(titles.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );

        let mut report = BatchReport {
            started_at,
            start_cursor: start,
            pages: titles.len(),
            blocks: 0,
            aggregate_writes: 0,
            pages_saved: 0,
            malformed: 0,
            scan_issues: 0,
            next_cursor: String::new(),
        };

        for title in &titles {
            pb.set_message(title.clone());
            let page = self.process_page(backend, title)?;
            report.blocks += page.blocks;
            report.aggregate_writes += page.aggregate_writes;
            report.malformed += page.malformed;
            report.scan_issues += page.issues.len();
            if page.saved {
                report.pages_saved += 1;
                info!("Re-rendered {}", title);
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        report.next_cursor = cursor::advance(&titles, self.batch_size);
        cursor.save(backend, &report.next_cursor)?;
        info!(
            "Batch done: {} pages, {} list updates, {} re-renders, next cursor {:?}",
            report.pages, report.aggregate_writes, report.pages_saved, report.next_cursor
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, StoreResult};
    use crate::markers::DEFAULT_PREFIX;
    use crate::store::{DryRun, MemoryStore, PageEnumerator};

    const CURSOR: &str = "Zeta Cursor";

    fn runner(batch_size: usize) -> BatchRunner {
        let mut settings = crate::config::Settings::load(None).unwrap();
        settings.batch_size = batch_size;
        settings.cursor_title = CURSOR.to_string();
        BatchRunner::new(&settings, Markers::new(DEFAULT_PREFIX).unwrap())
    }

    #[test]
    fn scanned_block_lands_in_aggregate() {
        let store = MemoryStore::with_pages([(
            "T",
            "intro\n{{ListGenBot-SourceStart|Foo}}\nline one\n==Skip me==\nline two\n{{ListGenBot-SourceEnd}}",
        )]);
        let report = runner(25).process_page(&store, "T").unwrap();
        assert_eq!(report.blocks, 1);
        assert_eq!(report.aggregate_writes, 1);
        assert!(!report.saved);
        assert_eq!(store.text("ListGenBot Foo").unwrap(), "==T==\nline one\nline two");
    }

    #[test]
    fn batch_sweep_advances_and_wraps() {
        let store = MemoryStore::with_pages([("Alpha", "a"), ("Beta", "b"), ("Gamma", "c")]);
        let r = runner(2);

        assert_eq!(r.run_once(&store).unwrap().next_cursor, "Beta");
        assert_eq!(r.cursor().load(&store).unwrap(), "Beta");
        assert_eq!(r.run_once(&store).unwrap().next_cursor, "Gamma");
        // The cursor page is part of the corpus too.
        assert_eq!(r.run_once(&store).unwrap().next_cursor, CURSOR);
        let last = r.run_once(&store).unwrap();
        assert_eq!(last.pages, 1);
        assert_eq!(last.next_cursor, "");
        assert_eq!(r.cursor().load(&store).unwrap(), "");
    }

    #[test]
    fn end_to_end_sources_and_consumers() {
        let apple = std::fs::read_to_string("tests/fixtures/apple_facts.wiki").unwrap();
        let index = std::fs::read_to_string("tests/fixtures/fruit_index.wiki").unwrap();
        let store = MemoryStore::with_pages([
            ("Apple Facts", apple.as_str()),
            ("Banana Facts", "{{ListGenBot-SourceStart|Fruit}}\n* Banana\n{{ListGenBot-SourceEnd}}"),
            ("Fruit Index", index.as_str()),
        ]);

        let report = runner(25).run_once(&store).unwrap();
        assert_eq!(report.pages, 3);
        assert_eq!(report.blocks, 2);
        assert_eq!(report.aggregate_writes, 2);
        assert_eq!(report.pages_saved, 1);
        assert_eq!(report.next_cursor, "");

        assert_eq!(
            store.text("ListGenBot Fruit").unwrap(),
            "==Apple Facts==\n* Cox\n* Braeburn\n==Banana Facts==\n* Banana"
        );
        let rendered = store.text("Fruit Index").unwrap();
        assert!(rendered.contains(
            "{{ListGenBot-ListAlphabeticalStart|Fruit}}\n* Banana\n* Braeburn\n* Cox\n{{ListGenBot-ListAlphabeticalEnd}}"
        ));
        assert!(rendered.contains("===([[Apple Facts]])===\n* Cox\n* Braeburn\n===([[Banana Facts]])===\n* Banana"));

        // Sections shuffle to the end and back on a second pass; the final
        // texts match and the consumer page is not saved again.
        let aggregate = store.text("ListGenBot Fruit").unwrap();
        let again = runner(25).run_once(&store).unwrap();
        assert_eq!(again.pages_saved, 0);
        assert_eq!(store.text("ListGenBot Fruit").unwrap(), aggregate);
        assert_eq!(store.text("Fruit Index").unwrap(), rendered);
    }

    #[test]
    fn page_renders_its_own_contribution() {
        let store = MemoryStore::with_pages([(
            "Cherry",
            "{{ListGenBot-SourceStart|Fruit}}\n* Cherry\n{{ListGenBot-SourceEnd}}\n{{ListGenBot-ListAlphabeticalStart|Fruit}}\n{{ListGenBot-ListAlphabeticalEnd}}",
        )]);
        let report = runner(25).process_page(&store, "Cherry").unwrap();
        assert!(report.saved);
        assert!(store
            .text("Cherry")
            .unwrap()
            .ends_with("{{ListGenBot-ListAlphabeticalStart|Fruit}}\n* Cherry\n{{ListGenBot-ListAlphabeticalEnd}}"));
    }

    #[test]
    fn emptied_block_removes_section() {
        let store = MemoryStore::with_pages([
            ("ListGenBot Foo", "==A==\na\n==T==\nold\n==B==\nb"),
            ("T", "{{ListGenBot-SourceStart|Foo}}\n{{ListGenBot-SourceEnd}}"),
        ]);
        runner(25).process_page(&store, "T").unwrap();
        assert_eq!(store.text("ListGenBot Foo").unwrap(), "==A==\na\n==B==\nb");
    }

    #[test]
    fn dry_run_leaves_store_untouched() {
        let store = MemoryStore::with_pages([
            ("A", "{{ListGenBot-SourceStart|Foo}}\nx\n{{ListGenBot-SourceEnd}}"),
            ("B", "{{ListGenBot-ListAlphabeticalStart|Foo}}\n{{ListGenBot-ListAlphabeticalEnd}}"),
        ]);
        let dry = DryRun::new(&store);
        let report = runner(25).run_once(&dry).unwrap();
        assert_eq!(report.pages_saved, 1);
        assert!(store.edits().is_empty());
        assert!(store.text("ListGenBot Foo").is_none());
        let titles: Vec<_> = dry.edits().into_iter().map(|e| e.title).collect();
        assert_eq!(titles, vec!["ListGenBot Foo", "B"]);
    }

    struct FailingStore {
        inner: MemoryStore,
        broken: &'static str,
    }

    impl DocumentStore for FailingStore {
        fn fetch(&self, title: &str) -> StoreResult<String> {
            if title == self.broken {
                return Err(StoreError::Decode("connection reset".into()));
            }
            self.inner.fetch(title)
        }

        fn save(&self, title: &str, text: &str, note: &str) -> StoreResult<()> {
            self.inner.save(title, text, note)
        }
    }

    impl PageEnumerator for FailingStore {
        fn list_from(&self, from: &str, limit: usize) -> StoreResult<Vec<String>> {
            self.inner.list_from(from, limit)
        }
    }

    #[test]
    fn transport_failure_keeps_cursor() {
        let store = FailingStore {
            inner: MemoryStore::with_pages([
                ("Alpha", "a"),
                ("Beta", "b"),
                ("Gamma", "c"),
                (CURSOR, "Alpha"),
            ]),
            broken: "Beta",
        };
        let err = runner(2).run_once(&store).unwrap_err();
        assert!(matches!(err, EngineError::Store(StoreError::Decode(_))));
        assert_eq!(store.inner.text(CURSOR).unwrap(), "Alpha");
    }
}
