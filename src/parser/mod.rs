pub mod scanner;
pub mod sections;

pub use scanner::{scan_page, ContentBlock, Scan, ScanIssue};
pub use sections::{AggregateDoc, Section};
