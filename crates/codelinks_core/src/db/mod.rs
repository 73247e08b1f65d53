//! SQLite storage bootstrap, driver adapter and connection contracts.
//!
//! # Responsibility
//! - Define the connection/transaction contracts consumed by the unit of work.
//! - Open and configure SQLite connections and apply schema migrations.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - A finished transaction rejects every further use.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod connection;
pub mod migrations;
mod open;
pub mod sqlite;

pub use connection::{ConnectionProvider, DbConnection, DbTransaction, TransactionState};
pub use open::{connect, open_db};
pub use sqlite::{DbLocation, SqliteConnection, SqliteConnectionProvider, SqliteTransaction};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// The physical connection is not open (never opened, or already closed).
    ConnectionClosed,
    /// The transaction was committed, rolled back or disposed.
    TransactionFinished(TransactionState),
    /// Driver failure reported by a non-SQLite connection implementation.
    Driver(String),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::ConnectionClosed => write!(f, "database connection is closed"),
            Self::TransactionFinished(state) => {
                write!(f, "transaction is no longer active (state: {state})")
            }
            Self::Driver(message) => write!(f, "database driver error: {message}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
