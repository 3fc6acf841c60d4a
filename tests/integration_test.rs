// ABOUTME: Integration tests for dumping and loading whole databases
// ABOUTME: Runs the engines and facade end-to-end against SQLite databases in temp directories

use std::fs;
use tabledump::config::Options;
use tabledump::db::{Database, Page, SqliteDatabase, Value};
use tabledump::error::{DirectoryExistsError, SchemaError};
use tabledump::format::Format;
use tabledump::serialization::helpers::{boolean_columns, coerce_booleans};
use tabledump::serialization::{Dumper, Serializer};

const SCHEMA: &str = "
    CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, active BOOLEAN, score REAL);
    CREATE TABLE notes (user_id INTEGER, body TEXT);
    CREATE TABLE archived (id INTEGER PRIMARY KEY);
    CREATE TABLE schema_migrations (version TEXT);
";

fn empty_database() -> SqliteDatabase {
    let db = SqliteDatabase::open_in_memory().unwrap();
    db.connection().execute_batch(SCHEMA).unwrap();
    db
}

/// `users` gets `user_count` rows cycling through the raw boolean encodings
fn seeded_database(user_count: i64) -> SqliteDatabase {
    let db = empty_database();
    let conn = db.connection();
    let raw_active = ["'t'", "'f'", "'1'", "'0'", "1", "0"];

    conn.execute_batch("BEGIN").unwrap();
    for id in 1..=user_count {
        conn.execute_batch(&format!(
            "INSERT INTO users VALUES ({}, 'user {}', {}, {})",
            id,
            id,
            raw_active[((id - 1) % 6) as usize],
            id as f64 / 4.0
        ))
        .unwrap();
    }
    conn.execute_batch(
        "INSERT INTO notes VALUES (1, 'first, with comma'), (1, '\\N'), (2, NULL), (2, 'it''s \"quoted\"');
         INSERT INTO schema_migrations VALUES ('20240101');
         COMMIT;",
    )
    .unwrap();
    db
}

fn all_pages(db: &dyn Database, table: &str) -> Page {
    let mut rows = Vec::new();
    Dumper::new(db)
        .each_page(table, |page| {
            rows.extend(page);
            Ok(())
        })
        .unwrap();
    rows
}

#[test]
fn test_pages_partition_the_table() {
    let db = seeded_database(2500);
    let mut sizes = Vec::new();
    let mut paged = Vec::new();

    let pages = Dumper::new(&db)
        .with_page_size(1000)
        .each_page("users", |page| {
            sizes.push(page.len());
            paged.extend(page);
            Ok(())
        })
        .unwrap();

    assert_eq!(pages, 3);
    assert_eq!(sizes, vec![1000, 1000, 500]);

    let mut unpaged = db.select_all("SELECT * FROM users ORDER BY id").unwrap();
    coerce_booleans(&mut unpaged, &boolean_columns(&db, "users").unwrap());
    assert_eq!(paged, unpaged);
}

#[test]
fn test_boolean_column_is_normalized() {
    let db = seeded_database(6);
    let active: Vec<Value> = all_pages(&db, "users")
        .into_iter()
        .map(|row| row["active"].clone())
        .collect();

    assert_eq!(
        active,
        vec![
            Value::Bool(true),
            Value::Bool(false),
            Value::Bool(true),
            Value::Bool(false),
            Value::Bool(true),
            Value::Bool(false),
        ]
    );
}

#[test]
fn test_single_file_round_trip_in_every_format() {
    for format in [Format::Json, Format::Csv] {
        let source = seeded_database(25);
        let target = empty_database();
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(format!("dump.{}", format.extension()));
        let options = Options::default().with_format(format).with_page_size(7);

        Serializer::new(&source, options.clone()).dump(&path).unwrap();
        let summary = Serializer::new(&target, options).load(&path, true).unwrap();

        assert_eq!(summary.tables, vec!["notes", "users"], "{}", format);
        assert_eq!(summary.rows, 29, "{}", format);
        for table in ["notes", "users"] {
            assert_eq!(
                all_pages(&source, table),
                all_pages(&target, table),
                "{} table {}",
                format,
                table
            );
        }
    }
}

#[test]
fn test_directory_round_trip_in_every_format() {
    for format in [Format::Json, Format::Csv] {
        let source = seeded_database(10);
        let target = empty_database();
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("dump");
        let options = Options::default().with_format(format);

        let summary = Serializer::new(&source, options.clone())
            .dump_to_dir(&dir)
            .unwrap();
        assert_eq!(summary.tables_dumped, 2);

        let mut files: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        files.sort();
        assert_eq!(
            files,
            vec![
                format!("notes.{}", format.extension()),
                format!("users.{}", format.extension())
            ]
        );

        Serializer::new(&target, options)
            .load_from_dir(&dir, true)
            .unwrap();
        assert_eq!(all_pages(&source, "users"), all_pages(&target, "users"));
        assert_eq!(all_pages(&source, "notes"), all_pages(&target, "notes"));
    }
}

#[test]
fn test_empty_tables_produce_no_output() {
    let db = seeded_database(3);
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("dump.jsonl");

    let summary = Serializer::new(&db, Options::default()).dump(&path).unwrap();

    assert_eq!(summary.tables_skipped, 1);
    let content = fs::read_to_string(&path).unwrap();
    assert!(!content.contains("archived"));
    assert!(!content.contains("schema_migrations"));

    let dir = tmp.path().join("dir");
    Serializer::new(&db, Options::default())
        .dump_to_dir(&dir)
        .unwrap();
    assert!(!dir.join("archived.jsonl").exists());
    assert!(!dir.join("schema_migrations.jsonl").exists());
}

#[test]
fn test_dump_to_existing_directory_fails() {
    let db = seeded_database(3);
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("dump");
    let serializer = Serializer::new(&db, Options::default());

    serializer.dump_to_dir(&dir).unwrap();
    let err = serializer.dump_to_dir(&dir).unwrap_err();

    assert!(err.downcast_ref::<DirectoryExistsError>().is_some());
}

#[test]
fn test_load_from_dir_skips_dot_files() {
    let source = seeded_database(4);
    let target = empty_database();
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("dump");

    Serializer::new(&source, Options::default())
        .dump_to_dir(&dir)
        .unwrap();
    fs::write(dir.join(".gitkeep"), "not a dump {{{").unwrap();

    let summary = Serializer::new(&target, Options::default())
        .load_from_dir(&dir, true)
        .unwrap();
    assert_eq!(summary.rows, 8);
}

#[test]
fn test_load_without_truncate_appends() {
    let source = seeded_database(0);
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("notes.csv");
    let options = Options::default().with_format(Format::Csv);
    Serializer::new(&source, options.clone()).dump(&path).unwrap();

    let serializer = Serializer::new(&source, options);
    serializer.load(&path, false).unwrap();
    assert_eq!(source.select_count("SELECT COUNT(*) FROM notes").unwrap(), 8);

    serializer.load(&path, true).unwrap();
    assert_eq!(source.select_count("SELECT COUNT(*) FROM notes").unwrap(), 4);
}

#[test]
fn test_load_into_mismatched_schema_fails() {
    let source = seeded_database(2);
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("dump.jsonl");
    Serializer::new(&source, Options::default()).dump(&path).unwrap();

    let target = SqliteDatabase::open_in_memory().unwrap();
    target
        .connection()
        .execute_batch(
            "CREATE TABLE notes (user_id INTEGER, text TEXT);
             CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, active BOOLEAN, score REAL);",
        )
        .unwrap();

    let err = Serializer::new(&target, Options::default())
        .load(&path, true)
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<SchemaError>(),
        Some(&SchemaError::ColumnNotFound {
            table: "notes".to_string(),
            column: "body".to_string()
        })
    );
}

#[test]
fn test_failed_schema_check_keeps_target_rows() {
    let source = seeded_database(2);
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("dump.csv");
    let options = Options::default().with_format(Format::Csv);
    Serializer::new(&source, options.clone()).dump(&path).unwrap();

    let target = SqliteDatabase::open_in_memory().unwrap();
    target
        .connection()
        .execute_batch(
            "CREATE TABLE notes (user_id INTEGER, text TEXT);
             INSERT INTO notes VALUES (7, 'keep me'), (8, 'me too');",
        )
        .unwrap();

    let err = Serializer::new(&target, options)
        .load(&path, true)
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<SchemaError>(),
        Some(SchemaError::ColumnNotFound { .. })
    ));
    assert_eq!(target.select_count("SELECT COUNT(*) FROM notes").unwrap(), 2);
}

#[test]
fn test_missing_target_table_is_a_schema_error() {
    let source = seeded_database(2);
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("dump.jsonl");
    Serializer::new(&source, Options::default()).dump(&path).unwrap();

    let target = SqliteDatabase::open_in_memory().unwrap();
    let err = Serializer::new(&target, Options::default())
        .load(&path, true)
        .unwrap_err();

    assert_eq!(
        err.downcast_ref::<SchemaError>(),
        Some(&SchemaError::TableNotFound("notes".to_string()))
    );
}

#[test]
fn test_untyped_and_binary_columns_round_trip() {
    let schema = "CREATE TABLE loose (k, v, payload BLOB);";
    for format in [Format::Json, Format::Csv] {
        let source = SqliteDatabase::open_in_memory().unwrap();
        source
            .connection()
            .execute_batch(&format!(
                "{}
                 INSERT INTO loose VALUES (1, 2.5, X'00FF10');
                 INSERT INTO loose VALUES ('007', '1.0', X'');
                 INSERT INTO loose VALUES ('\\b', 'NaN', NULL);
                 INSERT INTO loose VALUES (3, 'text', X'41503851');",
                schema
            ))
            .unwrap();
        let target = SqliteDatabase::open_in_memory().unwrap();
        target.connection().execute_batch(schema).unwrap();

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(format!("dump.{}", format.extension()));
        let options = Options::default().with_format(format);
        Serializer::new(&source, options.clone()).dump(&path).unwrap();
        Serializer::new(&target, options).load(&path, true).unwrap();

        let query = "SELECT * FROM loose ORDER BY k";
        let before = source.select_all(query).unwrap();
        let after = target.select_all(query).unwrap();
        assert_eq!(before, after, "{}", format);
        assert_eq!(after[0]["k"], Value::Int(1), "{}", format);
        assert_eq!(after[0]["v"], Value::Float(2.5), "{}", format);
        assert_eq!(after[0]["payload"], Value::Bytes(vec![0x00, 0xff, 0x10]), "{}", format);
        assert_eq!(after[2]["k"], Value::from("007"), "{}", format);
        assert_eq!(after[3]["k"], Value::from("\\b"), "{}", format);
    }
}

#[test]
fn test_excluded_tables_are_not_dumped() {
    let db = seeded_database(2);
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("dump");
    let mut options = Options::default();
    options.exclude_tables.push("notes".to_string());

    Serializer::new(&db, options).dump_to_dir(&dir).unwrap();

    assert!(dir.join("users.jsonl").exists());
    assert!(!dir.join("notes.jsonl").exists());
}

#[test]
fn test_table_names_unusable_as_file_names_are_rejected() {
    for name in ["a/b", ".hidden"] {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.connection()
            .execute_batch(&format!(
                "CREATE TABLE \"{name}\" (x INTEGER); INSERT INTO \"{name}\" VALUES (1);"
            ))
            .unwrap();
        let tmp = tempfile::tempdir().unwrap();

        let result =
            Serializer::new(&db, Options::default()).dump_to_dir(&tmp.path().join("dump"));
        assert!(result.is_err(), "{}", name);
    }
}

#[test]
fn test_file_backed_database() {
    let tmp = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", tmp.path().join("app.db").display());
    let db = tabledump::db::connect(&url).unwrap();
    db.execute("CREATE TABLE kv (k TEXT PRIMARY KEY, v TEXT)").unwrap();
    db.execute("INSERT INTO kv VALUES ('a', '1'), ('b', NULL)").unwrap();

    let path = tmp.path().join("kv.jsonl");
    let serializer = Serializer::new(db.as_ref(), Options::default());
    serializer.dump(&path).unwrap();
    db.execute("DELETE FROM kv").unwrap();
    serializer.load(&path, true).unwrap();

    let rows = all_pages(db.as_ref(), "kv");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["v"], Value::Null);
}
