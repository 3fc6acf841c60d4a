// ABOUTME: Load engine that replays dumped tables into an existing schema
// ABOUTME: Verifies target columns, optionally truncates, inserts rows and resets key sequences

use super::helpers::{coerce_boolean, quote_table};
use crate::db::{Database, Value};
use crate::error::SchemaError;
use crate::format::{Format, TableChunk, TableSource};
use crate::utils::sanitize_identifier;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Totals reported after a load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Tables in the order they were first seen
    pub tables: Vec<String>,
    pub rows: u64,
}

impl LoadSummary {
    fn merge(&mut self, other: LoadSummary) {
        self.tables.extend(other.tables);
        self.rows += other.rows;
    }
}

/// Insert statement pieces for one target table
struct TablePlan {
    insert_prefix: String,
    boolean_positions: Vec<usize>,
}

pub struct Loader<'a> {
    db: &'a dyn Database,
}

impl<'a> Loader<'a> {
    pub fn new(db: &'a dyn Database) -> Self {
        Self { db }
    }

    /// Replay every chunk of `source`.
    ///
    /// With `truncate` each table is emptied before its first rows are
    /// inserted; otherwise rows are appended and key conflicts surface as
    /// driver errors.
    pub fn load(&self, source: &mut dyn TableSource, truncate: bool) -> Result<LoadSummary> {
        let mut summary = LoadSummary::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut plan: Option<(String, TablePlan)> = None;

        while let Some(chunk) = source.next_chunk()? {
            let new_table = !matches!(&plan, Some((table, _)) if *table == chunk.table);
            if new_table {
                // Schema mismatches must fail before any rows are removed
                let table_plan = self.plan_table(&chunk)?;
                if seen.insert(chunk.table.clone()) {
                    summary.tables.push(chunk.table.clone());
                    if truncate {
                        tracing::info!("Truncating table '{}'", sanitize_identifier(&chunk.table));
                        self.db.truncate_table(&chunk.table)?;
                    }
                }
                plan = Some((chunk.table.clone(), table_plan));
            }

            if let Some((_, table_plan)) = &plan {
                summary.rows += self.load_records(table_plan, &chunk)?;
            }
        }

        for table in &summary.tables {
            self.db
                .reset_pk_sequence(table)
                .with_context(|| format!("Failed to reset key sequence for '{}'", table))?;
        }

        tracing::info!(
            "Loaded {} rows into {} table(s)",
            summary.rows,
            summary.tables.len()
        );
        Ok(summary)
    }

    fn plan_table(&self, chunk: &TableChunk) -> Result<TablePlan> {
        let columns = self.db.columns(&chunk.table)?;

        let mut boolean_positions = Vec::new();
        for (idx, name) in chunk.columns.iter().enumerate() {
            let Some(column) = columns.iter().find(|c| &c.name == name) else {
                return Err(SchemaError::ColumnNotFound {
                    table: chunk.table.clone(),
                    column: name.clone(),
                }
                .into());
            };
            if column.is_boolean() {
                boolean_positions.push(idx);
            }
        }

        let quoted_columns = chunk
            .columns
            .iter()
            .map(|c| self.db.quote_column_name(c))
            .collect::<Vec<_>>()
            .join(",");

        Ok(TablePlan {
            insert_prefix: format!(
                "INSERT INTO {} ({}) VALUES",
                quote_table(self.db, &chunk.table),
                quoted_columns
            ),
            boolean_positions,
        })
    }

    fn load_records(&self, plan: &TablePlan, chunk: &TableChunk) -> Result<u64> {
        for record in &chunk.records {
            let values = coerce_record(record, &plan.boolean_positions)
                .iter()
                .map(|value| self.db.quote(value))
                .collect::<Vec<_>>()
                .join(",");
            self.db
                .execute(&format!("{} ({})", plan.insert_prefix, values))
                .with_context(|| format!("Failed to insert into '{}'", chunk.table))?;
        }
        Ok(chunk.records.len() as u64)
    }

    /// Load one file in `format`
    pub fn load_file(&self, path: &Path, format: Format, truncate: bool) -> Result<LoadSummary> {
        tracing::info!("Loading {}", path.display());
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let mut source = format.source(BufReader::new(file));
        self.load(&mut *source, truncate)
            .with_context(|| format!("Failed to load {}", path.display()))
    }

    /// Load every visible file in `dir`, in file name order
    pub fn load_directory(&self, dir: &Path, format: Format, truncate: bool) -> Result<LoadSummary> {
        let mut summary = LoadSummary::default();
        for path in directory_entries(dir)? {
            summary.merge(self.load_file(&path, format, truncate)?);
        }
        Ok(summary)
    }
}

/// Regular files of `dir` whose names do not start with `.`, sorted by name
pub fn directory_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in
        fs::read_dir(dir).with_context(|| format!("Failed to read directory {}", dir.display()))?
    {
        let entry = entry.with_context(|| format!("Failed to read directory {}", dir.display()))?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        if path.is_file() {
            entries.push(path);
        }
    }
    entries.sort();
    Ok(entries)
}

/// Apply boolean coercion to the values at `boolean_positions`
pub fn coerce_record(record: &[Value], boolean_positions: &[usize]) -> Vec<Value> {
    record
        .iter()
        .enumerate()
        .map(|(idx, v)| {
            if boolean_positions.contains(&idx) {
                coerce_boolean(v)
            } else {
                v.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteDatabase;
    use std::collections::VecDeque;

    struct VecSource(VecDeque<TableChunk>);

    impl TableSource for VecSource {
        fn next_chunk(&mut self) -> Result<Option<TableChunk>> {
            Ok(self.0.pop_front())
        }
    }

    fn chunk(table: &str, columns: &[&str], records: Vec<Vec<Value>>) -> TableChunk {
        TableChunk {
            table: table.to_string(),
            columns: columns.iter().map(|s| s.to_string()).collect(),
            records,
        }
    }

    fn database() -> SqliteDatabase {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.connection()
            .execute_batch(
                "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, admin BOOLEAN);
                 INSERT INTO users VALUES (100, 'existing', 0);",
            )
            .unwrap();
        db
    }

    fn source() -> VecSource {
        VecSource(VecDeque::from(vec![
            chunk("users", &["id", "name", "admin"], vec![]),
            chunk(
                "users",
                &["id", "name", "admin"],
                vec![
                    vec![Value::Int(1), "ann".into(), "t".into()],
                    vec![Value::Int(2), Value::Null, Value::Bool(false)],
                ],
            ),
            chunk(
                "users",
                &["id", "name", "admin"],
                vec![vec![Value::from("3"), "o'hara".into(), "1".into()]],
            ),
        ]))
    }

    #[test]
    fn test_load_with_truncate_replaces_rows() {
        let db = database();
        let summary = Loader::new(&db).load(&mut source(), true).unwrap();

        assert_eq!(summary.tables, vec!["users"]);
        assert_eq!(summary.rows, 3);

        let rows = db.select_all("SELECT * FROM users ORDER BY id").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["admin"], Value::Int(1));
        assert_eq!(rows[1]["name"], Value::Null);
        assert_eq!(rows[1]["admin"], Value::Int(0));
        assert_eq!(rows[2]["id"], Value::Int(3));
        assert_eq!(rows[2]["name"], Value::from("o'hara"));
    }

    #[test]
    fn test_load_without_truncate_appends() {
        let db = database();
        Loader::new(&db).load(&mut source(), false).unwrap();
        assert_eq!(db.select_count("SELECT COUNT(*) FROM users").unwrap(), 4);
    }

    #[test]
    fn test_load_rejects_unknown_column() {
        let db = database();
        let mut source = VecSource(VecDeque::from(vec![chunk("users", &["id", "email"], vec![])]));
        let err = Loader::new(&db).load(&mut source, true).unwrap_err();
        assert_eq!(
            err.downcast_ref::<SchemaError>(),
            Some(&SchemaError::ColumnNotFound {
                table: "users".to_string(),
                column: "email".to_string()
            })
        );
    }

    #[test]
    fn test_load_rejects_unknown_table() {
        for truncate in [false, true] {
            let db = database();
            let mut source = VecSource(VecDeque::from(vec![chunk("ghosts", &["id"], vec![])]));
            let err = Loader::new(&db).load(&mut source, truncate).unwrap_err();
            assert_eq!(
                err.downcast_ref::<SchemaError>(),
                Some(&SchemaError::TableNotFound("ghosts".to_string())),
                "truncate = {}",
                truncate
            );
        }
    }

    #[test]
    fn test_unknown_column_leaves_existing_rows_when_truncating() {
        let db = database();
        let mut source = VecSource(VecDeque::from(vec![chunk(
            "users",
            &["id", "email"],
            vec![vec![Value::Int(1), "a@example.com".into()]],
        )]));

        let err = Loader::new(&db).load(&mut source, true).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<SchemaError>(),
            Some(SchemaError::ColumnNotFound { .. })
        ));
        assert_eq!(db.select_count("SELECT COUNT(*) FROM users").unwrap(), 1);
    }

    #[test]
    fn test_conflicting_keys_surface_driver_error() {
        let db = database();
        let mut source = VecSource(VecDeque::from(vec![chunk(
            "users",
            &["id", "name", "admin"],
            vec![vec![Value::Int(100), "dup".into(), Value::Bool(true)]],
        )]));
        let err = Loader::new(&db).load(&mut source, false).unwrap_err();
        assert!(err.to_string().contains("Failed to insert into 'users'"));
    }

    #[test]
    fn test_directory_entries_skip_hidden_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.jsonl"), "").unwrap();
        fs::write(dir.path().join("a.jsonl"), "").unwrap();
        fs::write(dir.path().join(".gitkeep"), "").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let entries = directory_entries(dir.path()).unwrap();
        let names: Vec<String> = entries
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jsonl", "b.jsonl"]);
    }

    #[test]
    fn test_coerce_record() {
        let record = vec![Value::from("t"), Value::from("t")];
        assert_eq!(
            coerce_record(&record, &[1]),
            vec![Value::from("t"), Value::Bool(true)]
        );
    }
}
