use thiserror::Error;

/// Failures talking to the document store or page enumerator.
///
/// Any of these aborts the current batch before the cursor moves.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("wiki api error {code}: {info}")]
    Api { code: String, info: String },

    #[error("unexpected api response: {0}")]
    Decode(String),

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid marker pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
