mod aggregate;
mod config;
mod cursor;
mod error;
mod markers;
mod parser;
mod render;
mod runner;
mod store;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::{BackendKind, Settings};
use markers::Markers;
use runner::BatchRunner;
use store::{Backend, DocumentStore, DryRun, SqliteStore, WikiClient};

#[derive(Parser)]
#[command(name = "listgen-bot", about = "Collects list fragments from wiki pages and renders them back")]
struct Cli {
    /// Configuration file (default: ./listgen.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process the next batch of pages and advance the cursor
    Run {
        /// Compute every edit but do not save anything
        #[arg(long)]
        dry_run: bool,
        /// Pages per batch (overrides configuration)
        #[arg(short = 'n', long, value_parser = clap::value_parser!(u64).range(1..))]
        batch_size: Option<u64>,
    },
    /// Scan, aggregate and render a single page
    Page {
        title: String,
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the list blocks found on a page
    Scan { title: String },
    /// Print a page with its lists rendered, without saving
    Render { title: String },
    /// Show the sections stored for a list
    List { name: String },
    /// Show the stored cursor
    Cursor {
        /// Clear the cursor so the next run starts from the beginning
        #[arg(long)]
        reset: bool,
    },
    /// Load *.wiki files into the sqlite corpus
    Import { dir: PathBuf },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn open_backend(settings: &Settings) -> Result<Box<dyn Backend>> {
    match settings.backend {
        BackendKind::Wiki => {
            let client = WikiClient::connect(&settings.wiki)
                .with_context(|| format!("Failed to connect to {}", settings.wiki.api_url))?;
            Ok(Box::new(client))
        }
        BackendKind::Sqlite => {
            let store = SqliteStore::open(&settings.sqlite.path)
                .with_context(|| format!("Failed to open {:?}", settings.sqlite.path))?;
            Ok(Box::new(store))
        }
    }
}

fn main() -> Result<()> {
    init_tracing();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    let markers = Markers::new(&settings.marker_prefix)?;
    info!(backend = ?settings.backend, batch_size = settings.batch_size, "Settings loaded");

    match cli.command {
        Commands::Run { dry_run, batch_size } => {
            let backend = open_backend(&settings)?;
            let mut runner =
                BatchRunner::new(&settings, markers).with_progress(std::io::stderr().is_terminal());
            if let Some(n) = batch_size {
                runner = runner.with_batch_size(n as usize);
            }

            if dry_run {
                let dry = DryRun::new(backend.as_ref());
                let report = runner.run_once(&dry)?;
                report.print();
                let edits = dry.edits();
                println!("\nDry run: {} edits not saved.", edits.len());
                for e in edits {
                    println!("  {} ({})", e.title, e.note);
                }
            } else {
                runner.run_once(backend.as_ref())?.print();
            }
        }
        Commands::Page { title, dry_run } => {
            let backend = open_backend(&settings)?;
            let runner = BatchRunner::new(&settings, markers);
            let report = if dry_run {
                let dry = DryRun::new(backend.as_ref());
                let report = runner.process_page(&dry, &title)?;
                for e in dry.edits() {
                    println!("would save {} ({})", e.title, e.note);
                }
                report
            } else {
                runner.process_page(backend.as_ref(), &title)?
            };
            println!(
                "{}: {} blocks, {} list updates, {} directives rendered, {} mismatched, page {}.",
                title,
                report.blocks,
                report.aggregate_writes,
                report.rendered,
                report.malformed,
                if report.saved { "saved" } else { "unchanged" }
            );
        }
        Commands::Scan { title } => {
            let backend = open_backend(&settings)?;
            let text = backend.fetch(&title)?;
            let scan = parser::scan_page(&markers, &title, &text);
            if scan.blocks.is_empty() {
                println!("No list blocks on {}.", title);
            }
            for block in &scan.blocks {
                println!(
                    "--- {} ({} lines) -> {}",
                    block.list_name,
                    block.lines.len(),
                    markers.aggregate_title(&block.list_name)
                );
                for line in &block.lines {
                    println!("  {}", line);
                }
            }
            for issue in &scan.issues {
                println!("! {}", issue);
            }
        }
        Commands::Render { title } => {
            let backend = open_backend(&settings)?;
            let text = backend.fetch(&title)?;
            let rendered = render::render(backend.as_ref(), &markers, &text)?;
            println!("{}", rendered.text);
            info!(
                rendered = rendered.rendered,
                malformed = rendered.malformed,
                changed = rendered.text != text,
                "Rendered {}",
                title
            );
        }
        Commands::List { name } => {
            let backend = open_backend(&settings)?;
            let title = markers.aggregate_title(&name);
            let doc = parser::AggregateDoc::from_text(&backend.fetch(&title)?);
            let sections = doc.sections(&markers);
            println!("{}: {} sections", title, sections.len());
            for section in &sections {
                println!("  {} ({} lines)", section.heading, section.body.len());
            }
        }
        Commands::Cursor { reset } => {
            let backend = open_backend(&settings)?;
            let cursor = cursor::Cursor::new(&settings.cursor_title);
            if reset {
                cursor.save(backend.as_ref(), "")?;
                println!("Cursor cleared.");
            } else {
                let value = cursor.load(backend.as_ref())?;
                if value.is_empty() {
                    println!("Cursor is empty; next run starts from the beginning.");
                } else {
                    println!("Next run starts at {:?} ({}).", value, cursor.title());
                }
            }
        }
        Commands::Import { dir } => {
            if settings.backend != BackendKind::Sqlite {
                bail!("import needs backend = \"sqlite\"");
            }
            let store = SqliteStore::open(&settings.sqlite.path)?;
            let n = store.import_dir(&dir)?;
            println!("Imported {} pages into {:?}", n, settings.sqlite.path);
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }
    Ok(())
}
