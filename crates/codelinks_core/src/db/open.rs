//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or shared in-memory SQLite connections.
//! - Configure connection pragmas required by core behavior.
//! - Trigger schema migrations once, when the provider is created.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - `open_db` returns connections with migrations fully applied.

use super::migrations::apply_migrations;
use super::sqlite::DbLocation;
use super::DbResult;
use log::{debug, error, info};
use rusqlite::Connection;
use std::time::{Duration, Instant};

/// Opens a database and applies all pending migrations.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(location: &DbLocation, busy_timeout: Duration) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = location.mode();
    info!("event=db_open module=db status=start mode={mode}");

    let result = connect(location, busy_timeout).and_then(|mut conn| {
        apply_migrations(&mut conn)?;
        Ok(conn)
    });

    match &result {
        Ok(_) => info!(
            "event=db_open module=db status=ok mode={mode} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error mode={mode} duration_ms={} error={err}",
            started_at.elapsed().as_millis()
        ),
    }
    result
}

/// Opens one physical connection without touching the schema.
pub fn connect(location: &DbLocation, busy_timeout: Duration) -> DbResult<Connection> {
    let conn = Connection::open(location.uri())?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(busy_timeout)?;
    debug!(
        "event=db_connect module=db status=ok mode={}",
        location.mode()
    );
    Ok(conn)
}
