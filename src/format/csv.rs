// ABOUTME: Tagged CSV format with `table` header records and `row` data records
// ABOUTME: Encodes NULL as \N and booleans as t/f so values survive a text round trip

use super::{TableChunk, TableSink, TableSource};
use crate::db::value::{decode_base64, encode_base64};
use crate::db::{Row, Value};
use crate::error::FormatError;
use crate::serialization::helpers::project;
use anyhow::{Context, Result};
use std::io::{BufRead, Write};

const FORMAT: &str = "csv";
const TABLE_TAG: &str = "table";
const ROW_TAG: &str = "row";
const NULL_MARKER: &str = "\\N";
const BYTES_PREFIX: &str = "\\b";

/// Rows per chunk handed to the loader
const READ_BATCH: usize = 1000;

/// Bare fields that read back as numbers
fn parse_number(field: &str) -> Option<Value> {
    if let Ok(i) = field.parse::<i64>() {
        return Some(Value::Int(i));
    }
    field.parse::<f64>().ok().map(Value::Float)
}

fn encode(value: &Value) -> String {
    match value {
        Value::Null => NULL_MARKER.to_string(),
        Value::Bool(b) => (if *b { "t" } else { "f" }).to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(x) => format!("{:?}", x),
        // Text that would otherwise read back as a number or a marker
        Value::Text(s) if s.starts_with('\\') || parse_number(s).is_some() => format!("\\{}", s),
        Value::Text(s) => s.clone(),
        Value::Bytes(b) => format!("{}{}", BYTES_PREFIX, encode_base64(b)),
    }
}

fn decode(field: &str) -> Result<Value, String> {
    if field == NULL_MARKER {
        Ok(Value::Null)
    } else if let Some(encoded) = field.strip_prefix(BYTES_PREFIX) {
        decode_base64(encoded)
            .map(Value::Bytes)
            .map_err(|e| format!("invalid base64 in binary value: {}", e))
    } else if let Some(rest) = field.strip_prefix('\\') {
        Ok(Value::Text(rest.to_string()))
    } else {
        Ok(parse_number(field).unwrap_or_else(|| Value::Text(field.to_string())))
    }
}

pub struct CsvSink<W: Write> {
    writer: ::csv::Writer<W>,
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W) -> Self {
        let writer = ::csv::WriterBuilder::new()
            .flexible(true)
            .has_headers(false)
            .from_writer(writer);
        Self { writer }
    }
}

impl<W: Write> TableSink for CsvSink<W> {
    fn write_columns(&mut self, table: &str, columns: &[String]) -> Result<()> {
        let record = [TABLE_TAG, table]
            .into_iter()
            .chain(columns.iter().map(String::as_str));
        self.writer
            .write_record(record)
            .context("Failed to write CSV table header")
    }

    fn write_page(&mut self, _table: &str, columns: &[String], rows: &[Row]) -> Result<()> {
        for row in rows {
            let fields = project(row, columns);
            let record = std::iter::once(ROW_TAG.to_string()).chain(fields.iter().map(encode));
            self.writer
                .write_record(record)
                .context("Failed to write CSV row")?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush dump output")
    }
}

pub struct CsvSource<R: BufRead> {
    reader: ::csv::Reader<R>,
    record_no: usize,
    current: Option<(String, Vec<String>)>,
    pending: Option<::csv::StringRecord>,
}

impl<R: BufRead> CsvSource<R> {
    pub fn new(reader: R) -> Self {
        let reader = ::csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        Self {
            reader,
            record_no: 0,
            current: None,
            pending: None,
        }
    }

    fn read_record(&mut self) -> Result<Option<::csv::StringRecord>> {
        if let Some(record) = self.pending.take() {
            return Ok(Some(record));
        }
        let mut record = ::csv::StringRecord::new();
        let more = self
            .reader
            .read_record(&mut record)
            .map_err(|e| FormatError::new(FORMAT, self.record_no + 1, e.to_string()))?;
        if !more {
            return Ok(None);
        }
        self.record_no += 1;
        Ok(Some(record))
    }

    fn error(&self, message: impl Into<String>) -> anyhow::Error {
        FormatError::new(FORMAT, self.record_no, message).into()
    }
}

impl<R: BufRead> TableSource for CsvSource<R> {
    fn next_chunk(&mut self) -> Result<Option<TableChunk>> {
        let mut records = Vec::new();

        while let Some(record) = self.read_record()? {
            match record.get(0) {
                Some(TABLE_TAG) => {
                    if !records.is_empty() {
                        // Finish the previous table's batch first
                        self.pending = Some(record);
                        break;
                    }
                    let Some(table) = record.get(1).filter(|t| !t.is_empty()) else {
                        return Err(self.error("table record without a table name"));
                    };
                    let table = table.to_string();
                    let columns: Vec<String> = record.iter().skip(2).map(String::from).collect();
                    self.current = Some((table.clone(), columns.clone()));
                    return Ok(Some(TableChunk {
                        table,
                        columns,
                        records: Vec::new(),
                    }));
                }
                Some(ROW_TAG) => {
                    let Some((table, columns)) = &self.current else {
                        return Err(self.error("row record before any table record"));
                    };
                    if record.len() - 1 != columns.len() {
                        return Err(self.error(format!(
                            "row has {} values but table '{}' has {} columns",
                            record.len() - 1,
                            table,
                            columns.len()
                        )));
                    }
                    let values = record
                        .iter()
                        .skip(1)
                        .map(decode)
                        .collect::<std::result::Result<Vec<_>, _>>()
                        .map_err(|message| self.error(message))?;
                    records.push(values);
                    if records.len() >= READ_BATCH {
                        break;
                    }
                }
                other => {
                    return Err(self.error(format!(
                        "unknown record tag '{}'",
                        other.unwrap_or_default()
                    )));
                }
            }
        }

        if records.is_empty() {
            return Ok(None);
        }
        let Some((table, columns)) = self.current.clone() else {
            return Ok(None);
        };
        Ok(Some(TableChunk {
            table,
            columns,
            records,
        }))
    }
}
