// ABOUTME: Dump engine that pages through every table and hands pages to a sink
// ABOUTME: Orders pages by primary key (or all columns) so pagination is deterministic

use super::helpers::{boolean_columns, coerce_booleans, quote_table};
use crate::db::{Database, Page};
use crate::format::TableSink;
use crate::utils::sanitize_identifier;
use anyhow::{bail, Result};

pub const DEFAULT_PAGE_SIZE: u64 = 1000;

/// Bookkeeping tables of migration frameworks; never dumped
pub const IGNORED_TABLES: &[&str] = &["schema_info", "schema_migrations"];

/// Totals reported after a dump
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpSummary {
    pub tables_dumped: usize,
    pub tables_skipped: usize,
    pub rows: u64,
}

pub struct Dumper<'a> {
    db: &'a dyn Database,
    page_size: u64,
    exclude: Vec<String>,
}

impl<'a> Dumper<'a> {
    pub fn new(db: &'a dyn Database) -> Self {
        Self {
            db,
            page_size: DEFAULT_PAGE_SIZE,
            exclude: Vec::new(),
        }
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Skip these tables in addition to [`IGNORED_TABLES`]
    pub fn excluding<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(tables.into_iter().map(Into::into));
        self
    }

    /// Tables to dump, sorted by name
    pub fn tables(&self) -> Result<Vec<String>> {
        let mut tables: Vec<String> = self
            .db
            .tables()?
            .into_iter()
            .filter(|t| !IGNORED_TABLES.contains(&t.as_str()))
            .filter(|t| !self.exclude.contains(t))
            .collect();
        tables.sort();
        Ok(tables)
    }

    pub fn dump(&self, sink: &mut dyn TableSink) -> Result<DumpSummary> {
        let tables = self.tables()?;
        self.dump_tables(sink, &tables)
    }

    pub fn dump_tables(&self, sink: &mut dyn TableSink, tables: &[String]) -> Result<DumpSummary> {
        let mut summary = DumpSummary::default();
        for table in tables {
            sink.before_table(table)?;
            let rows = self.dump_table(sink, table)?;
            sink.after_table(table)?;

            if rows == 0 {
                summary.tables_skipped += 1;
            } else {
                summary.tables_dumped += 1;
                summary.rows += rows;
            }
        }
        Ok(summary)
    }

    /// Write one table's column header and pages. Empty tables write nothing.
    ///
    /// Returns the number of rows written.
    pub fn dump_table(&self, sink: &mut dyn TableSink, table: &str) -> Result<u64> {
        let count = self.table_record_count(table)?;
        self.write_table(sink, table, count)
    }

    pub(crate) fn write_table(&self, sink: &mut dyn TableSink, table: &str, count: u64) -> Result<u64> {
        if count == 0 {
            tracing::debug!("Skipping empty table '{}'", sanitize_identifier(table));
            return Ok(0);
        }

        tracing::info!("Dumping table '{}' ({} rows)", sanitize_identifier(table), count);
        let columns = self.table_column_names(table)?;
        sink.write_columns(table, &columns)?;

        let mut written = 0;
        self.pages(table, count, |page| {
            written += page.len() as u64;
            sink.write_page(table, &columns, &page)
        })?;
        Ok(written)
    }

    pub fn table_column_names(&self, table: &str) -> Result<Vec<String>> {
        Ok(self.db.columns(table)?.into_iter().map(|c| c.name).collect())
    }

    /// Columns the page query orders by: the primary key in key order, or
    /// every column in declared order when the table has no primary key.
    pub fn order_columns(&self, table: &str) -> Result<Vec<String>> {
        let columns = self.db.columns(table)?;
        let mut key: Vec<_> = columns
            .iter()
            .filter_map(|c| c.primary_key.map(|pos| (pos, c.name.clone())))
            .collect();
        if key.is_empty() {
            return Ok(columns.into_iter().map(|c| c.name).collect());
        }
        key.sort();
        Ok(key.into_iter().map(|(_, name)| name).collect())
    }

    /// Fetch `table` page by page, calling `visit` with each page in order.
    ///
    /// Returns the number of pages visited, `ceil(count / page_size)`.
    pub fn each_page<F>(&self, table: &str, visit: F) -> Result<u64>
    where
        F: FnMut(Page) -> Result<()>,
    {
        let count = self.table_record_count(table)?;
        self.pages(table, count, visit)
    }

    fn pages<F>(&self, table: &str, total: u64, mut visit: F) -> Result<u64>
    where
        F: FnMut(Page) -> Result<()>,
    {
        if self.page_size == 0 {
            bail!("Page size must be at least 1");
        }

        let pages = total.div_ceil(self.page_size);
        let order_by = self
            .order_columns(table)?
            .iter()
            .map(|c| self.db.quote_column_name(c))
            .collect::<Vec<_>>()
            .join(", ");
        let booleans = boolean_columns(self.db, table)?;
        let quoted = quote_table(self.db, table);

        for page in 0..pages {
            let sql = self.db.add_limit_offset(
                &format!("SELECT * FROM {} ORDER BY {}", quoted, order_by),
                self.page_size,
                self.page_size * page,
            );
            let mut rows = self.db.select_all(&sql)?;
            coerce_booleans(&mut rows, &booleans);
            tracing::debug!(
                "Page {}/{} of '{}': {} rows",
                page + 1,
                pages,
                sanitize_identifier(table),
                rows.len()
            );
            visit(rows)?;
        }

        Ok(pages)
    }

    pub fn table_record_count(&self, table: &str) -> Result<u64> {
        self.db
            .select_count(&format!("SELECT COUNT(*) FROM {}", quote_table(self.db, table)))
    }
}
