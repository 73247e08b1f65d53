//! Immutable (connection, transaction) pair handed to repositories.

use crate::db::{DbConnection, DbResult, DbTransaction};
use std::rc::Rc;

/// Connection and transaction a repository is bound to for its whole life.
pub struct TransactionBinding<C: DbConnection> {
    connection: Rc<C>,
    transaction: Rc<C::Transaction>,
}

impl<C: DbConnection> TransactionBinding<C> {
    pub fn new(connection: Rc<C>, transaction: Rc<C::Transaction>) -> Self {
        Self {
            connection,
            transaction,
        }
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn transaction(&self) -> &C::Transaction {
        &self.transaction
    }

    /// Fails once the bound transaction has been committed, rolled back or disposed.
    pub fn ensure_active(&self) -> DbResult<()> {
        self.transaction.ensure_active()
    }
}

impl<C: DbConnection> Clone for TransactionBinding<C> {
    fn clone(&self) -> Self {
        Self {
            connection: Rc::clone(&self.connection),
            transaction: Rc::clone(&self.transaction),
        }
    }
}
