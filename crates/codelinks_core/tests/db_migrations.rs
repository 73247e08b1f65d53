use codelinks_core::db::migrations::latest_version;
use codelinks_core::db::{open_db, DbError, DbLocation, SqliteConnectionProvider};
use rusqlite::Connection;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_millis(200);

#[test]
fn shared_memory_database_gets_full_schema() {
    let conn = open_db(&DbLocation::shared_memory(), TIMEOUT).unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in ["lookup_types", "users", "links", "code_snippets"] {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn foreign_keys_are_enforced() {
    let conn = open_db(&DbLocation::shared_memory(), TIMEOUT).unwrap();

    let err = conn
        .execute(
            "INSERT INTO links (uuid, owner_uuid, url, title, created_at, created_by, updated_at, updated_by)
             VALUES ('l1', 'missing-user', 'https://example.com', 't', 0, 's', 0, 's');",
            [],
        )
        .unwrap_err();

    assert!(err.to_string().contains("FOREIGN KEY"));
}

#[test]
fn reopening_a_file_database_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let location = DbLocation::file(dir.path().join("codelinks.sqlite3"));

    let first = open_db(&location, TIMEOUT).unwrap();
    assert_eq!(schema_version(&first), latest_version());
    drop(first);

    let second = open_db(&location, TIMEOUT).unwrap();
    assert_eq!(schema_version(&second), latest_version());
    assert_table_exists(&second, "code_snippets");
}

#[test]
fn newer_schema_version_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");
    Connection::open(&path)
        .unwrap()
        .execute_batch("PRAGMA user_version = 42;")
        .unwrap();

    let err = SqliteConnectionProvider::open(DbLocation::file(&path), TIMEOUT)
        .err()
        .unwrap();

    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 42);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn shared_memory_survives_between_connections() {
    let provider = SqliteConnectionProvider::in_memory().unwrap();
    let DbLocation::SharedMemory(_) = provider.location() else {
        panic!("expected shared memory location");
    };

    let conn = open_db(provider.location(), TIMEOUT).unwrap();
    assert_table_exists(&conn, "users");
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
