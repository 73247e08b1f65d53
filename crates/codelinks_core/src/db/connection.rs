//! Connection and transaction contracts.
//!
//! # Responsibility
//! - Describe the minimal driver surface the unit of work coordinates.
//! - Let tests substitute recording connections for the SQLite adapter.
//!
//! # Invariants
//! - Handles are shared through `Rc` and mutated through `&self`; none of these
//!   types is meant to cross threads.
//! - `DbTransaction::dispose` never fails and may be called any number of times.

use super::{DbError, DbResult};
use std::fmt::{Display, Formatter};
use std::rc::Rc;

/// Lifecycle state of one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
    Disposed,
}

impl TransactionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
            Self::Disposed => "disposed",
        }
    }
}

impl Display for TransactionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One atomic unit of work scoped to a single connection.
pub trait DbTransaction {
    fn state(&self) -> TransactionState;

    fn commit(&self) -> DbResult<()>;

    fn rollback(&self) -> DbResult<()>;

    /// Releases the transaction, rolling it back when still active.
    fn dispose(&self);

    /// Rejects use of a committed, rolled back or disposed transaction.
    fn ensure_active(&self) -> DbResult<()> {
        match self.state() {
            TransactionState::Active => Ok(()),
            other => Err(DbError::TransactionFinished(other)),
        }
    }
}

/// Handle to one relational-database session.
pub trait DbConnection {
    type Transaction: DbTransaction + 'static;

    fn is_open(&self) -> bool;

    fn open(&self) -> DbResult<()>;

    fn begin_transaction(&self) -> DbResult<Self::Transaction>;

    fn close(&self) -> DbResult<()>;
}

/// Issues connection handles. The handle may come back open or closed.
pub trait ConnectionProvider {
    type Connection: DbConnection + 'static;

    fn connection(&self) -> DbResult<Rc<Self::Connection>>;
}

/// Closes `connection` only when it is currently open.
pub fn close_if_open<C: DbConnection + ?Sized>(connection: &C) -> DbResult<()> {
    if connection.is_open() {
        connection.close()?;
    }
    Ok(())
}
