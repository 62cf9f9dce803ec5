//! Settings layered as defaults, then an optional TOML file, then `LISTGEN_*` env vars.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "listgen.toml";
pub const DEFAULT_BATCH_SIZE: usize = 25;
pub const DEFAULT_CURSOR_TITLE: &str = "Powerpedia:ListGenBotInfo";
pub const DEFAULT_SQLITE_PATH: &str = "data/corpus.sqlite";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Wiki,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WikiSettings {
    pub api_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub accept_invalid_certs: bool,
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SqliteSettings {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub batch_size: usize,
    pub cursor_title: String,
    pub marker_prefix: String,
    pub backend: BackendKind,
    pub wiki: WikiSettings,
    pub sqlite: SqliteSettings,
}

impl Settings {
    /// Load settings. An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings: Settings = Config::builder()
            .set_default("batch_size", DEFAULT_BATCH_SIZE as u64)?
            .set_default("cursor_title", DEFAULT_CURSOR_TITLE)?
            .set_default("marker_prefix", crate::markers::DEFAULT_PREFIX)?
            .set_default("backend", "wiki")?
            .set_default("wiki.api_url", "http://localhost/w/api.php")?
            .set_default("wiki.accept_invalid_certs", false)?
            .set_default(
                "wiki.user_agent",
                concat!("listgen-bot/", env!("CARGO_PKG_VERSION")),
            )?
            .set_default("sqlite.path", DEFAULT_SQLITE_PATH)?
            .add_source(file)
            .add_source(
                Environment::with_prefix("LISTGEN")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }
        if self.cursor_title.trim().is_empty() {
            bail!("cursor_title must not be empty");
        }
        if self.marker_prefix.trim().is_empty() {
            bail!("marker_prefix must not be empty");
        }
        Ok(())
    }
}
