// ABOUTME: JSON Lines format: a column header line per table followed by one line per page
// ABOUTME: Streams pages without holding a whole table in memory on either side

use super::{TableChunk, TableSink, TableSource};
use crate::db::{Row, Value};
use crate::error::FormatError;
use crate::serialization::helpers::project_all;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{BufRead, Write};

const FORMAT: &str = "json";

#[derive(Serialize)]
struct ColumnsLine<'a> {
    table: &'a str,
    columns: &'a [String],
}

#[derive(Serialize)]
struct RecordsLine<'a> {
    table: &'a str,
    records: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Line {
    Columns { table: String, columns: Vec<String> },
    Records { table: String, records: Vec<Vec<Value>> },
}

pub struct JsonSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    fn write_line<T: Serialize>(&mut self, line: &T) -> Result<()> {
        serde_json::to_writer(&mut self.writer, line).context("Failed to encode JSON line")?;
        self.writer
            .write_all(b"\n")
            .context("Failed to write dump output")?;
        Ok(())
    }
}

impl<W: Write> TableSink for JsonSink<W> {
    fn write_columns(&mut self, table: &str, columns: &[String]) -> Result<()> {
        self.write_line(&ColumnsLine { table, columns })
    }

    fn write_page(&mut self, table: &str, columns: &[String], rows: &[Row]) -> Result<()> {
        self.write_line(&RecordsLine {
            table,
            records: project_all(rows, columns),
        })
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush dump output")
    }
}

pub struct JsonSource<R: BufRead> {
    reader: R,
    line_no: usize,
    columns: HashMap<String, Vec<String>>,
}

impl<R: BufRead> JsonSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            columns: HashMap::new(),
        }
    }

    fn error(&self, message: impl Into<String>) -> anyhow::Error {
        FormatError::new(FORMAT, self.line_no, message).into()
    }
}

impl<R: BufRead> TableSource for JsonSource<R> {
    fn next_chunk(&mut self) -> Result<Option<TableChunk>> {
        let mut buf = String::new();
        loop {
            buf.clear();
            let read = self
                .reader
                .read_line(&mut buf)
                .context("Failed to read dump input")?;
            if read == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let text = buf.trim();
            if text.is_empty() {
                continue;
            }

            let line: Line = serde_json::from_str(text).map_err(|e| self.error(e.to_string()))?;
            return match line {
                Line::Columns { table, columns } => {
                    self.columns.insert(table.clone(), columns.clone());
                    Ok(Some(TableChunk {
                        table,
                        columns,
                        records: Vec::new(),
                    }))
                }
                Line::Records { table, records } => {
                    let Some(columns) = self.columns.get(&table).cloned() else {
                        return Err(self.error(format!(
                            "records for table '{}' appear before its column header",
                            table
                        )));
                    };
                    if let Some(bad) = records.iter().find(|r| r.len() != columns.len()) {
                        return Err(self.error(format!(
                            "record has {} values but table '{}' has {} columns",
                            bad.len(),
                            table,
                            columns.len()
                        )));
                    }
                    Ok(Some(TableChunk {
                        table,
                        columns,
                        records,
                    }))
                }
            };
        }
    }
}
