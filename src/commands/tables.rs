// ABOUTME: Lists the tables a dump would include along with their row counts
// ABOUTME: Honors the same exclusions as the dump commands

use crate::config::Options;
use crate::db::Database;
use crate::serialization::Dumper;
use anyhow::Result;

/// Print each dumpable table and its row count; returns the `(table, rows)` pairs
pub fn tables(db: &dyn Database, options: &Options) -> Result<Vec<(String, u64)>> {
    let dumper = Dumper::new(db).excluding(options.exclude_tables.iter().cloned());

    let mut counts = Vec::new();
    for table in dumper.tables()? {
        let rows = dumper.table_record_count(&table)?;
        counts.push((table, rows));
    }

    println!();
    println!("{:<32} {:>12}", "Table", "Rows");
    println!("{}", "─".repeat(45));
    for (table, rows) in &counts {
        println!("{:<32} {:>12}", table, rows);
    }
    println!("{}", "─".repeat(45));
    println!(
        "Total: {} table(s), {} rows",
        counts.len(),
        counts.iter().map(|(_, rows)| rows).sum::<u64>()
    );
    println!();

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteDatabase;

    #[test]
    fn test_tables_reports_counts_without_ignored_tables() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.connection()
            .execute_batch(
                "CREATE TABLE b (x INTEGER);
                 CREATE TABLE a (x INTEGER);
                 CREATE TABLE schema_migrations (version TEXT);
                 INSERT INTO b VALUES (1), (2);",
            )
            .unwrap();

        let counts = tables(&db, &Options::default()).unwrap();
        assert_eq!(counts, vec![("a".to_string(), 0), ("b".to_string(), 2)]);
    }
}
