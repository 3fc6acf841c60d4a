// ABOUTME: Pluggable on-disk formats for dumped tables
// ABOUTME: Defines the sink/source contract and the JSON Lines and CSV implementations

mod csv;
mod json;

pub use self::csv::{CsvSink, CsvSource};
pub use self::json::{JsonSink, JsonSource};

use crate::db::{Row, Value};
use anyhow::Result;
use serde::Deserialize;
use std::fmt;
use std::io::{BufRead, Write};

/// Destination of a dump.
///
/// The engine calls `before_table`, then (for non-empty tables)
/// `write_columns` once and `write_page` once per page, then `after_table`.
/// The table hooks default to no-ops.
pub trait TableSink {
    fn before_table(&mut self, _table: &str) -> Result<()> {
        Ok(())
    }

    fn write_columns(&mut self, table: &str, columns: &[String]) -> Result<()>;

    /// `columns` is the list previously passed to `write_columns`
    fn write_page(&mut self, table: &str, columns: &[String], rows: &[Row]) -> Result<()>;

    fn after_table(&mut self, _table: &str) -> Result<()> {
        Ok(())
    }

    /// Flush buffered output. Called once after the last table.
    fn finish(&mut self) -> Result<()>;
}

/// A batch of records read back from a dump
#[derive(Debug, Clone, PartialEq)]
pub struct TableChunk {
    pub table: String,
    pub columns: Vec<String>,
    /// Values in `columns` order. Empty for the chunk that announces a table.
    pub records: Vec<Vec<Value>>,
}

/// Reader side of a format: yields chunks in file order, tables contiguous.
pub trait TableSource {
    fn next_chunk(&mut self) -> Result<Option<TableChunk>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// One JSON object per line: a column header per table, then one line per page
    #[default]
    Json,
    /// Tagged CSV records: `table,<name>,<columns...>` then `row,<values...>`
    Csv,
}

impl Format {
    /// File extension used for per-table files in directory mode
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Json => "jsonl",
            Format::Csv => "csv",
        }
    }

    pub fn sink<'w, W: Write + 'w>(&self, writer: W) -> Box<dyn TableSink + 'w> {
        match self {
            Format::Json => Box::new(JsonSink::new(writer)),
            Format::Csv => Box::new(CsvSink::new(writer)),
        }
    }

    pub fn source<'r, R: BufRead + 'r>(&self, reader: R) -> Box<dyn TableSource + 'r> {
        match self {
            Format::Json => Box::new(JsonSource::new(reader)),
            Format::Csv => Box::new(CsvSource::new(reader)),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Json => write!(f, "json"),
            Format::Csv => write!(f, "csv"),
        }
    }
}
