//! Schema migrations for the CodeLinks database.
//!
//! # Invariants
//! - Versions are strictly increasing; `PRAGMA user_version` holds the last
//!   applied one.
//! - Pending migrations apply in a single transaction, all or nothing.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "users_lookup_types",
        sql: include_str!("0001_users_lookup_types.sql"),
    },
    Migration {
        version: 2,
        name: "links_snippets",
        sql: include_str!("0002_links_snippets.sql"),
    },
];

/// Schema version this build writes.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Brings `conn` up to [`latest_version`]; refuses databases from a newer build.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let db_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let latest_supported = latest_version();
    if db_version > latest_supported {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        });
    }

    let pending = MIGRATIONS
        .iter()
        .filter(|migration| migration.version > db_version)
        .collect::<Vec<_>>();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in &pending {
        tx.execute_batch(migration.sql)?;
        tx.pragma_update(None, "user_version", migration.version)?;
    }
    tx.commit()?;

    for migration in pending {
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    Ok(())
}
