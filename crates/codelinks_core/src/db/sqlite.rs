//! SQLite implementation of the connection contracts.
//!
//! # Responsibility
//! - Hand out connection handles whose physical session is opened and closed
//!   by the unit of work.
//! - Map transaction lifecycle calls onto `BEGIN`/`COMMIT`/`ROLLBACK`.
//!
//! # Invariants
//! - A transaction only ever reaches the physical connection it began on; once
//!   that connection is closed the transaction reports `ConnectionClosed`.
//! - A failed `COMMIT` leaves the transaction active so `dispose` rolls it back.
//! - Shared in-memory databases stay alive for the provider lifetime.

use super::connection::{ConnectionProvider, DbConnection, DbTransaction, TransactionState};
use super::open::{connect, open_db};
use super::{DbError, DbResult};
use crate::uow::TransactionBinding;
use log::{debug, warn};
use rusqlite::Connection;
use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::{Rc, Weak};
use std::time::Duration;
use uuid::Uuid;

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    File(PathBuf),
    /// Named shared-cache in-memory database.
    SharedMemory(String),
}

impl DbLocation {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Creates a uniquely named in-memory database.
    pub fn shared_memory() -> Self {
        Self::SharedMemory(format!("codelinks-{}", Uuid::new_v4().simple()))
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::SharedMemory(_) => "memory",
        }
    }

    pub(crate) fn uri(&self) -> PathBuf {
        match self {
            Self::File(path) => path.clone(),
            Self::SharedMemory(name) => {
                PathBuf::from(format!("file:{name}?mode=memory&cache=shared"))
            }
        }
    }
}

/// Issues closed `SqliteConnection` handles for one database.
pub struct SqliteConnectionProvider {
    location: DbLocation,
    busy_timeout: Duration,
    _anchor: Option<Connection>,
}

impl SqliteConnectionProvider {
    /// Bootstraps the schema and returns a provider for `location`.
    pub fn open(location: DbLocation, busy_timeout: Duration) -> DbResult<Self> {
        let bootstrap = open_db(&location, busy_timeout)?;
        let anchor = match location {
            DbLocation::SharedMemory(_) => Some(bootstrap),
            DbLocation::File(_) => None,
        };

        Ok(Self {
            location,
            busy_timeout,
            _anchor: anchor,
        })
    }

    /// Provider over a fresh private in-memory database.
    pub fn in_memory() -> DbResult<Self> {
        Self::open(DbLocation::shared_memory(), DEFAULT_BUSY_TIMEOUT)
    }

    pub fn location(&self) -> &DbLocation {
        &self.location
    }
}

impl ConnectionProvider for SqliteConnectionProvider {
    type Connection = SqliteConnection;

    fn connection(&self) -> DbResult<Rc<SqliteConnection>> {
        Ok(Rc::new(SqliteConnection::new(
            self.location.clone(),
            self.busy_timeout,
        )))
    }
}

/// Connection handle whose physical session is opened on demand.
pub struct SqliteConnection {
    location: DbLocation,
    busy_timeout: Duration,
    raw: RefCell<Option<Rc<Connection>>>,
}

impl SqliteConnection {
    pub fn new(location: DbLocation, busy_timeout: Duration) -> Self {
        Self {
            location,
            busy_timeout,
            raw: RefCell::new(None),
        }
    }

    pub fn location(&self) -> &DbLocation {
        &self.location
    }

    /// Runs `f` against the open physical connection.
    pub fn with_raw<T, E>(&self, f: impl FnOnce(&Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<DbError>,
    {
        let raw = self.raw.borrow();
        let conn = raw.as_deref().ok_or(DbError::ConnectionClosed)?;
        f(conn)
    }
}

impl DbConnection for SqliteConnection {
    type Transaction = SqliteTransaction;

    fn is_open(&self) -> bool {
        self.raw.borrow().is_some()
    }

    fn open(&self) -> DbResult<()> {
        if self.is_open() {
            return Ok(());
        }
        let conn = connect(&self.location, self.busy_timeout)?;
        *self.raw.borrow_mut() = Some(Rc::new(conn));
        Ok(())
    }

    fn begin_transaction(&self) -> DbResult<SqliteTransaction> {
        let raw = self.raw.borrow();
        let conn = raw.as_ref().ok_or(DbError::ConnectionClosed)?;
        conn.execute_batch("BEGIN IMMEDIATE;")?;
        Ok(SqliteTransaction {
            raw: Rc::downgrade(conn),
            state: Cell::new(TransactionState::Active),
        })
    }

    fn close(&self) -> DbResult<()> {
        let Some(conn) = self.raw.borrow_mut().take() else {
            return Ok(());
        };
        match Rc::try_unwrap(conn) {
            Ok(conn) => conn.close().map_err(|(_, err)| DbError::from(err)),
            // A transaction is mid-statement; dropping the last handle closes it.
            Err(_) => Ok(()),
        }
    }
}

/// Transaction over one physical SQLite connection.
pub struct SqliteTransaction {
    raw: Weak<Connection>,
    state: Cell<TransactionState>,
}

impl SqliteTransaction {
    fn finish(&self, sql: &str, next: TransactionState) -> DbResult<()> {
        self.ensure_active()?;
        let conn = self.raw.upgrade().ok_or(DbError::ConnectionClosed)?;
        conn.execute_batch(sql)?;
        self.state.set(next);
        Ok(())
    }
}

impl DbTransaction for SqliteTransaction {
    fn state(&self) -> TransactionState {
        self.state.get()
    }

    fn commit(&self) -> DbResult<()> {
        self.finish("COMMIT;", TransactionState::Committed)
    }

    fn rollback(&self) -> DbResult<()> {
        self.finish("ROLLBACK;", TransactionState::RolledBack)
    }

    fn dispose(&self) {
        if self.state.get() != TransactionState::Active {
            return;
        }
        if let Some(conn) = self.raw.upgrade() {
            if !conn.is_autocommit() {
                if let Err(err) = conn.execute_batch("ROLLBACK;") {
                    warn!("event=tx_dispose module=db status=error error={err}");
                }
            }
        }
        self.state.set(TransactionState::Disposed);
        debug!("event=tx_dispose module=db status=ok");
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl TransactionBinding<SqliteConnection> {
    /// Runs `f` on the bound connection after checking the transaction is live.
    pub fn run<T, E>(&self, f: impl FnOnce(&Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<DbError>,
    {
        self.ensure_active()?;
        self.connection().with_raw(f)
    }
}
