// ABOUTME: SQLite backend built on rusqlite
// ABOUTME: Introspects tables via sqlite_master/PRAGMA table_info and returns typed rows

use super::{quote_string, Column, Database, Row, Value};
use crate::error::SchemaError;
use anyhow::{Context, Result};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::path::Path;

pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Opening SQLite database {}", path.display());
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database {}", path.display()))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        Ok(Self { conn })
    }

    /// Direct access to the underlying connection, e.g. for creating schema
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

impl Database for SqliteDatabase {
    fn dialect(&self) -> &'static str {
        "sqlite"
    }

    fn tables(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
            )
            .context("Failed to list tables")?;

        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("Failed to list tables")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read table list")?;

        Ok(tables)
    }

    fn columns(&self, table: &str) -> Result<Vec<Column>> {
        let sql = format!("PRAGMA table_info({})", self.quote_table_name(table));
        let mut stmt = self
            .conn
            .prepare(&sql)
            .with_context(|| format!("Failed to get columns for '{}'", table))?;

        // cid, name, type, notnull, dflt_value, pk
        let columns = stmt
            .query_map([], |row| {
                let name: String = row.get(1)?;
                let declared: String = row.get::<_, Option<String>>(2)?.unwrap_or_default();
                let pk: i64 = row.get(5)?;
                let mut column = Column::new(name, &declared);
                column.primary_key = (pk > 0).then_some(pk as u32);
                Ok(column)
            })
            .with_context(|| format!("Failed to get columns for '{}'", table))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Failed to read columns for '{}'", table))?;

        if columns.is_empty() {
            return Err(SchemaError::TableNotFound(table.to_string()).into());
        }

        Ok(columns)
    }

    fn quote(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(x) if x.is_finite() => format!("{:?}", x),
            // SQLite cannot store NaN; infinities would be parsed as identifiers
            Value::Float(_) => "NULL".to_string(),
            Value::Text(s) => quote_string(s),
            Value::Bytes(b) => format!("X'{}'", hex(b)),
        }
    }

    fn select_all(&self, sql: &str) -> Result<Vec<Row>> {
        tracing::debug!(dialect = "sqlite", "{}", sql);
        let mut stmt = self
            .conn
            .prepare(sql)
            .with_context(|| format!("Failed to prepare query: {}", sql))?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query([]).context("Failed to run query")?;
        let mut result = Vec::new();
        while let Some(row) = rows.next().context("Failed to fetch row")? {
            let mut record = Row::with_capacity(names.len());
            for (idx, name) in names.iter().enumerate() {
                let value = match row.get_ref(idx)? {
                    ValueRef::Null => Value::Null,
                    ValueRef::Integer(i) => Value::Int(i),
                    ValueRef::Real(x) => Value::Float(x),
                    ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
                    ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
                };
                record.insert(name.clone(), value);
            }
            result.push(record);
        }

        Ok(result)
    }

    fn select_count(&self, sql: &str) -> Result<u64> {
        tracing::debug!(dialect = "sqlite", "{}", sql);
        let count: i64 = self
            .conn
            .query_row(sql, [], |row| row.get(0))
            .with_context(|| format!("Failed to run count query: {}", sql))?;
        Ok(count.max(0) as u64)
    }

    fn execute(&self, sql: &str) -> Result<u64> {
        tracing::debug!(dialect = "sqlite", "{}", sql);
        let affected = self
            .conn
            .execute(sql, [])
            .with_context(|| format!("Failed to execute: {}", sql))?;
        Ok(affected as u64)
    }
}
