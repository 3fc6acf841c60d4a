// ABOUTME: Configuration for dump/load runs from TOML files and command-line overrides
// ABOUTME: Resolves defaults, file settings, and flags into one Options value

use crate::format::Format;
use crate::serialization::dump::DEFAULT_PAGE_SIZE;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Settings read from a `tabledump.toml` style file. Every key is optional.
///
/// ```toml
/// database = "sqlite://db/development.sqlite3"
/// format = "csv"
/// page_size = 500
/// exclude_tables = ["ar_internal_metadata"]
/// quiet = false
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub database: Option<String>,
    pub format: Option<Format>,
    pub page_size: Option<u64>,
    pub exclude_tables: Vec<String>,
    pub quiet: Option<bool>,
}

impl FileConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: FileConfig = toml::from_str(content)?;
        if config.page_size == Some(0) {
            bail!("page_size must be at least 1");
        }
        Ok(config)
    }
}

/// Resolved settings passed into the facade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub format: Format,
    pub page_size: u64,
    /// Tables skipped in addition to the built-in ignore list
    pub exclude_tables: Vec<String>,
    /// Silence logging while a dump or load runs
    pub quiet: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            format: Format::default(),
            page_size: DEFAULT_PAGE_SIZE,
            exclude_tables: Vec::new(),
            quiet: true,
        }
    }
}

impl Options {
    /// Layer file settings over the current values
    pub fn apply_file(mut self, file: &FileConfig) -> Self {
        if let Some(format) = file.format {
            self.format = format;
        }
        if let Some(page_size) = file.page_size {
            self.page_size = page_size;
        }
        self.exclude_tables.extend(file.exclude_tables.iter().cloned());
        if let Some(quiet) = file.quiet {
            self.quiet = quiet;
        }
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }
}

/// Pick the database URL: explicit flag, then config file, then `DATABASE_URL`
pub fn resolve_database_url(flag: Option<String>, file: &FileConfig) -> Result<String> {
    if let Some(url) = flag.or_else(|| file.database.clone()) {
        return Ok(url);
    }
    std::env::var("DATABASE_URL").context(
        "No database given. Pass --database, set `database` in the config file, \
         or set DATABASE_URL",
    )
}
