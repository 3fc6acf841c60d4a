// ABOUTME: High-level dump and load entry points for single files and per-table directories
// ABOUTME: Silences logging for each operation and optionally drives a progress bar

use super::dump::Dumper;
use super::load::{LoadSummary, Loader};
use super::DumpSummary;
use crate::config::Options;
use crate::db::{Database, Row};
use crate::error::DirectoryExistsError;
use crate::format::TableSink;
use crate::logging;
use anyhow::{bail, Context, Result};
use indicatif::ProgressBar;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind};
use std::path::{Path, PathBuf};

/// Dumps and loads a whole database in one configured format.
///
/// # Examples
///
/// ```no_run
/// # use anyhow::Result;
/// # use tabledump::{config::Options, db, serialization::Serializer};
/// # fn example() -> Result<()> {
/// let db = db::connect("sqlite://db/development.sqlite3")?;
/// let serializer = Serializer::new(db.as_ref(), Options::default());
/// serializer.dump_to_dir("backup".as_ref())?;
/// serializer.load_from_dir("backup".as_ref(), true)?;
/// # Ok(())
/// # }
/// ```
pub struct Serializer<'a> {
    db: &'a dyn Database,
    options: Options,
    progress: Option<ProgressBar>,
}

impl<'a> Serializer<'a> {
    pub fn new(db: &'a dyn Database, options: Options) -> Self {
        Self {
            db,
            options,
            progress: None,
        }
    }

    /// Advance `bar` once per dumped table. Its length is set when a dump starts.
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    fn dumper(&self) -> Dumper<'a> {
        Dumper::new(self.db)
            .with_page_size(self.options.page_size)
            .excluding(self.options.exclude_tables.iter().cloned())
    }

    fn start_progress(&self, tables: usize) {
        if let Some(bar) = &self.progress {
            bar.set_length(tables as u64);
            bar.set_position(0);
        }
    }

    /// Dump every table into the single file at `path`
    pub fn dump(&self, path: &Path) -> Result<DumpSummary> {
        let _quiet = logging::quiet(self.options.quiet);
        tracing::info!("Dumping database to {}", path.display());

        let dumper = self.dumper();
        let tables = dumper.tables()?;
        self.start_progress(tables.len());

        let file =
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        let mut sink = self.options.format.sink(BufWriter::new(file));
        let summary = match &self.progress {
            Some(bar) => dumper.dump_tables(&mut ProgressSink::new(&mut *sink, bar), &tables)?,
            None => dumper.dump_tables(&mut *sink, &tables)?,
        };
        sink.finish()?;

        tracing::info!(
            "✓ Dumped {} rows from {} table(s)",
            summary.rows,
            summary.tables_dumped
        );
        Ok(summary)
    }

    /// Dump each non-empty table into `<dir>/<table>.<ext>`.
    ///
    /// `dir` must not exist yet; it is created here.
    pub fn dump_to_dir(&self, dir: &Path) -> Result<DumpSummary> {
        let _quiet = logging::quiet(self.options.quiet);

        if dir.exists() {
            return Err(DirectoryExistsError(dir.to_path_buf()).into());
        }
        fs::create_dir(dir).map_err(|e| -> anyhow::Error {
            if e.kind() == ErrorKind::AlreadyExists {
                DirectoryExistsError(dir.to_path_buf()).into()
            } else {
                anyhow::Error::new(e).context(format!("Failed to create {}", dir.display()))
            }
        })?;
        tracing::info!("Dumping database to directory {}", dir.display());

        let dumper = self.dumper();
        let tables = dumper.tables()?;
        self.start_progress(tables.len());

        let mut summary = DumpSummary::default();
        for table in &tables {
            let count = dumper.table_record_count(table)?;
            if count == 0 {
                tracing::debug!("Skipping empty table '{}'", table);
                summary.tables_skipped += 1;
            } else {
                let path = table_file_path(dir, table, self.options.format.extension())?;
                let file = File::create(&path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                let mut sink = self.options.format.sink(BufWriter::new(file));
                sink.before_table(table)?;
                summary.rows += dumper.write_table(&mut *sink, table, count)?;
                sink.after_table(table)?;
                sink.finish()?;
                summary.tables_dumped += 1;
            }
            if let Some(bar) = &self.progress {
                bar.inc(1);
            }
        }

        tracing::info!(
            "✓ Dumped {} rows into {} file(s)",
            summary.rows,
            summary.tables_dumped
        );
        Ok(summary)
    }

    /// Load the single dump file at `path`
    pub fn load(&self, path: &Path, truncate: bool) -> Result<LoadSummary> {
        let _quiet = logging::quiet(self.options.quiet);
        Loader::new(self.db).load_file(path, self.options.format, truncate)
    }

    /// Load every visible file of `dir` in file name order
    pub fn load_from_dir(&self, dir: &Path, truncate: bool) -> Result<LoadSummary> {
        let _quiet = logging::quiet(self.options.quiet);
        Loader::new(self.db).load_directory(dir, self.options.format, truncate)
    }
}

/// `<dir>/<table>.<extension>`, refusing names that would escape `dir` or
/// produce a hidden file that directory loads skip
pub fn table_file_path(dir: &Path, table: &str, extension: &str) -> Result<PathBuf> {
    if table.is_empty()
        || table.starts_with('.')
        || table.contains('/')
        || table.contains('\\')
        || table.contains('\0')
    {
        bail!("Table name '{}' cannot be used as a file name", table);
    }
    Ok(dir.join(format!("{}.{}", table, extension)))
}

/// Forwards to an inner sink and ticks the progress bar after each table
struct ProgressSink<'s> {
    inner: &'s mut dyn TableSink,
    bar: &'s ProgressBar,
}

impl<'s> ProgressSink<'s> {
    fn new(inner: &'s mut dyn TableSink, bar: &'s ProgressBar) -> Self {
        Self { inner, bar }
    }
}

impl TableSink for ProgressSink<'_> {
    fn before_table(&mut self, table: &str) -> Result<()> {
        self.bar.set_message(table.to_string());
        self.inner.before_table(table)
    }

    fn write_columns(&mut self, table: &str, columns: &[String]) -> Result<()> {
        self.inner.write_columns(table, columns)
    }

    fn write_page(&mut self, table: &str, columns: &[String], rows: &[Row]) -> Result<()> {
        self.inner.write_page(table, columns, rows)
    }

    fn after_table(&mut self, table: &str) -> Result<()> {
        self.inner.after_table(table)?;
        self.bar.inc(1);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.inner.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{SqliteDatabase, Value};
    use crate::format::Format;

    fn database() -> SqliteDatabase {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.connection()
            .execute_batch(
                "CREATE TABLE accounts (id INTEGER PRIMARY KEY, owner TEXT, frozen BOOLEAN);
                 CREATE TABLE audit (note TEXT);
                 INSERT INTO accounts VALUES (1, 'ann', 'f'), (2, 'bob', 't');",
            )
            .unwrap();
        db
    }

    #[test]
    fn test_dump_to_dir_writes_one_file_per_non_empty_table() {
        let db = database();
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("dump");

        let summary = Serializer::new(&db, Options::default())
            .dump_to_dir(&dir)
            .unwrap();

        assert_eq!(summary.tables_dumped, 1);
        assert_eq!(summary.tables_skipped, 1);
        assert!(dir.join("accounts.jsonl").is_file());
        assert!(!dir.join("audit.jsonl").exists());
    }

    #[test]
    fn test_dump_to_dir_refuses_existing_directory() {
        let db = database();
        let tmp = tempfile::tempdir().unwrap();

        let err = Serializer::new(&db, Options::default())
            .dump_to_dir(tmp.path())
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<DirectoryExistsError>(),
            Some(&DirectoryExistsError(tmp.path().to_path_buf()))
        );
    }

    #[test]
    fn test_progress_bar_counts_tables() {
        let db = database();
        let tmp = tempfile::tempdir().unwrap();
        let bar = ProgressBar::hidden();

        Serializer::new(&db, Options::default().with_format(Format::Csv))
            .with_progress(bar.clone())
            .dump(&tmp.path().join("all.csv"))
            .unwrap();

        assert_eq!(bar.length(), Some(2));
        assert_eq!(bar.position(), 2);
    }

    #[test]
    fn test_dump_then_load_single_file() {
        let db = database();
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("all.jsonl");
        let serializer = Serializer::new(&db, Options::default());

        serializer.dump(&path).unwrap();
        db.execute("DELETE FROM accounts").unwrap();
        let summary = serializer.load(&path, true).unwrap();

        assert_eq!(summary.rows, 2);
        let rows = db.select_all("SELECT * FROM accounts ORDER BY id").unwrap();
        assert_eq!(rows[1]["owner"], Value::from("bob"));
        assert_eq!(rows[1]["frozen"], Value::Int(1));
    }

    #[test]
    fn test_table_file_path_rejects_escaping_names() {
        let dir = Path::new("out");
        assert_eq!(
            table_file_path(dir, "users", "csv").unwrap(),
            PathBuf::from("out/users.csv")
        );
        for bad in ["", ".", "..", ".hidden", "a/b", "a\\b"] {
            assert!(table_file_path(dir, bad, "csv").is_err(), "{:?}", bad);
        }
    }
}
