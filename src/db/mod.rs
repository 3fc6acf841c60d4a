// ABOUTME: Database access layer shared by the dump and load engines
// ABOUTME: Defines the introspection/query trait and dispatches connection URLs to backends

pub mod postgres;
pub mod sqlite;
pub mod value;

pub use self::postgres::PostgresDatabase;
pub use self::sqlite::SqliteDatabase;
pub use value::{Column, ColumnType, Page, Row, Value};

use crate::error::ConnectionError;
use crate::utils;
use anyhow::Result;

/// Schema introspection and query interface the engines run against.
///
/// All calls are blocking. Implementations log each statement at debug
/// level so that facade operations can silence them as a group.
pub trait Database {
    /// Short dialect name used in log messages
    fn dialect(&self) -> &'static str;

    /// All user tables, in the backend's natural listing order
    fn tables(&self) -> Result<Vec<String>>;

    /// Column descriptors in declared order.
    ///
    /// Returns [`crate::error::SchemaError::TableNotFound`] when the table does not exist.
    fn columns(&self, table: &str) -> Result<Vec<Column>>;

    fn quote_table_name(&self, table: &str) -> String {
        quote_identifier(table)
    }

    fn quote_column_name(&self, column: &str) -> String {
        quote_identifier(column)
    }

    /// Render a value as an SQL literal for this dialect
    fn quote(&self, value: &Value) -> String;

    fn select_all(&self, sql: &str) -> Result<Vec<Row>>;

    /// Run a single-value count query
    fn select_count(&self, sql: &str) -> Result<u64>;

    /// Run a statement, returning the number of affected rows
    fn execute(&self, sql: &str) -> Result<u64>;

    fn add_limit_offset(&self, sql: &str, limit: u64, offset: u64) -> String {
        format!("{} LIMIT {} OFFSET {}", sql, limit, offset)
    }

    /// Remove every row of `table`, preferring TRUNCATE and falling back to DELETE
    fn truncate_table(&self, table: &str) -> Result<()> {
        let quoted = self.quote_table_name(table);
        if let Err(e) = self.execute(&format!("TRUNCATE {}", quoted)) {
            tracing::debug!(
                "TRUNCATE rejected for '{}' ({}), falling back to DELETE",
                utils::sanitize_identifier(table),
                e
            );
            self.execute(&format!("DELETE FROM {}", quoted))?;
        }
        Ok(())
    }

    /// Move the table's key sequence past the loaded rows, where the dialect has one
    fn reset_pk_sequence(&self, _table: &str) -> Result<()> {
        Ok(())
    }
}

/// Quote an identifier with double quotes, doubling embedded quotes.
///
/// Both supported dialects accept ANSI quoted identifiers.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal with single quotes, doubling embedded quotes
pub fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Open a database from a connection URL.
///
/// Accepted forms:
/// - `sqlite::memory:`
/// - `sqlite://relative/or/absolute/path.db` (also `sqlite:path.db`)
/// - `postgres://...` / `postgresql://...`
pub fn connect(url: &str) -> Result<Box<dyn Database>> {
    utils::validate_connection_string(url)?;

    if url == "sqlite::memory:" {
        return Ok(Box::new(SqliteDatabase::open_in_memory()?));
    }
    if let Some(path) = sqlite_path(url) {
        return Ok(Box::new(SqliteDatabase::open(path)?));
    }
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        return Ok(Box::new(PostgresDatabase::connect(url)?));
    }

    Err(ConnectionError::UnsupportedScheme(url.to_string()).into())
}

fn sqlite_path(url: &str) -> Option<&str> {
    url.strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .filter(|path| !path.is_empty())
}
