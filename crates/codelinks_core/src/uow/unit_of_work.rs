//! Unit of work coordinator.
//!
//! # Responsibility
//! - Open the connection and begin the transaction on first use.
//! - Resolve repositories through the factory and cache them per transaction.
//! - Commit or roll back, then always close the connection and reset to idle.
//!
//! # Invariants
//! - `Idle`: no transaction, empty cache. `Active`: live transaction, cache
//!   may be populated.
//! - Commit/rollback happen before the connection close; the close runs from a
//!   drop guard so failed finalization never leaks an open connection.
//! - Driver errors propagate unchanged; cleanup failures on the error path are
//!   logged, never raised.
//!
//! Not thread-safe. A `UnitOfWork` is `!Send` and must serve one sequential
//! caller.

use super::cache::{IntoContract, RepositoryCache, RepositoryKey};
use super::factory::{FactoryError, RepositoryFactory, TransactionalRepository};
use crate::context::CurrentUser;
use crate::db::connection::close_if_open;
use crate::db::{ConnectionProvider, DbConnection, DbError, DbTransaction};
use log::{debug, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

pub type UowResult<T> = Result<T, UnitOfWorkError>;

#[derive(Debug)]
pub enum UnitOfWorkError {
    /// Driver failure during open/begin/commit/rollback/close.
    Db(DbError),
    /// Repository construction failed; a configuration error.
    Factory(FactoryError),
}

impl Display for UnitOfWorkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Factory(err) => write!(f, "{err}"),
        }
    }
}

impl Error for UnitOfWorkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Factory(err) => Some(err),
        }
    }
}

impl From<DbError> for UnitOfWorkError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<FactoryError> for UnitOfWorkError {
    fn from(value: FactoryError) -> Self {
        Self::Factory(value)
    }
}

#[derive(Debug, Clone, Copy)]
enum Completion {
    Commit,
    Rollback,
}

impl Completion {
    fn event(self) -> &'static str {
        match self {
            Self::Commit => "uow_commit",
            Self::Rollback => "uow_rollback",
        }
    }
}

/// Releases the transaction and connection when finalization does not complete.
struct ReleaseGuard<'a, C: DbConnection> {
    connection: &'a C,
    transaction: Option<Rc<C::Transaction>>,
    armed: bool,
}

impl<'a, C: DbConnection> ReleaseGuard<'a, C> {
    fn new(connection: &'a C, transaction: Option<Rc<C::Transaction>>) -> Self {
        Self {
            connection,
            transaction,
            armed: true,
        }
    }

    fn transaction(&self) -> Option<&C::Transaction> {
        self.transaction.as_deref()
    }

    /// Keeps the connection open; the guarded step succeeded.
    fn disarm(mut self) {
        self.armed = false;
    }

    /// Success path: the transaction is finished, close and surface close errors.
    fn complete(mut self) -> Result<(), DbError> {
        self.armed = false;
        self.transaction = None;
        close_if_open(self.connection)
    }
}

impl<C: DbConnection> Drop for ReleaseGuard<'_, C> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(transaction) = self.transaction.take() {
            transaction.dispose();
        }
        if let Err(err) = close_if_open(self.connection) {
            warn!("event=uow_release module=uow status=error error={err}");
        }
    }
}

/// Coordinates one logical transaction across any number of repositories.
pub struct UnitOfWork<C: DbConnection> {
    connection: Rc<C>,
    factory: RepositoryFactory<C>,
    transaction: Option<Rc<C::Transaction>>,
    repositories: RepositoryCache,
}

impl<C: DbConnection> UnitOfWork<C> {
    /// Creates an idle unit of work over `connection`. Nothing is opened yet.
    pub fn new(connection: Rc<C>, factory: RepositoryFactory<C>) -> Self {
        Self {
            connection,
            factory,
            transaction: None,
            repositories: RepositoryCache::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.transaction.is_some()
    }

    pub fn cached_repositories(&self) -> usize {
        self.repositories.len()
    }

    pub fn connection(&self) -> &Rc<C> {
        &self.connection
    }

    /// Opens the connection if needed and begins a transaction.
    ///
    /// Repeated calls while active are no-ops; transactions never nest.
    pub fn begin_transaction(&mut self) -> UowResult<()> {
        self.active_transaction().map(|_| ())
    }

    fn active_transaction(&mut self) -> UowResult<Rc<C::Transaction>> {
        if let Some(transaction) = &self.transaction {
            return Ok(Rc::clone(transaction));
        }

        // Only a connection opened here is closed again when begin fails.
        let opened_here = !self.connection.is_open();
        if opened_here {
            self.connection.open()?;
        }
        let release = opened_here.then(|| ReleaseGuard::new(&*self.connection, None));
        let transaction = Rc::new(self.connection.begin_transaction()?);
        if let Some(release) = release {
            release.disarm();
        }
        self.transaction = Some(Rc::clone(&transaction));
        debug!("event=uow_begin module=uow status=ok");
        Ok(transaction)
    }

    /// Returns the repository for `(E, Contract, Impl)`, beginning a transaction
    /// when idle.
    ///
    /// Within one active transaction, identical type parameters always return
    /// the same instance.
    pub fn repository<E, Contract, Impl>(&mut self) -> UowResult<Rc<Contract>>
    where
        E: 'static,
        Contract: ?Sized + 'static,
        Impl: TransactionalRepository<C> + IntoContract<Contract>,
    {
        let transaction = self.active_transaction()?;
        let key = RepositoryKey::of::<E, Contract, Impl>();
        if let Some(repository) = self.repositories.get::<Contract>(&key) {
            return Ok(repository);
        }

        let repository = self
            .factory
            .create_repository::<E, Impl>(Rc::clone(&self.connection), transaction)?;
        let contract = Rc::new(repository).into_contract();
        self.repositories.insert(key, Rc::clone(&contract));
        Ok(contract)
    }

    /// Commits the active transaction (if any), then closes the connection.
    pub fn commit_changes(&mut self) -> UowResult<()> {
        self.finish(Completion::Commit)
    }

    /// Rolls back the active transaction (if any), then closes the connection.
    pub fn rollback_changes(&mut self) -> UowResult<()> {
        self.finish(Completion::Rollback)
    }

    fn finish(&mut self, completion: Completion) -> UowResult<()> {
        self.repositories.clear();
        let release = ReleaseGuard::new(&*self.connection, self.transaction.take());

        if let Some(transaction) = release.transaction() {
            let result = match completion {
                Completion::Commit => transaction.commit(),
                Completion::Rollback => transaction.rollback(),
            };
            if let Err(err) = result {
                warn!(
                    "event={} module=uow status=error error={err}",
                    completion.event()
                );
                return Err(err.into());
            }
        }

        release.complete()?;
        debug!("event={} module=uow status=ok", completion.event());
        Ok(())
    }

    /// Best-effort release of transaction and connection. Idempotent, never fails.
    pub fn dispose(&mut self) {
        self.repositories.clear();
        let was_active = self.transaction.is_some();
        drop(ReleaseGuard::new(&*self.connection, self.transaction.take()));
        if was_active {
            debug!("event=uow_dispose module=uow status=ok");
        }
    }
}

impl<C: DbConnection> Drop for UnitOfWork<C> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Creates one unit of work per logical operation.
pub struct UnitOfWorkFactory<P: ConnectionProvider> {
    provider: Rc<P>,
    factory: RepositoryFactory<P::Connection>,
}

impl<P: ConnectionProvider> UnitOfWorkFactory<P> {
    pub fn new(provider: P, factory: RepositoryFactory<P::Connection>) -> Self {
        Self {
            provider: Rc::new(provider),
            factory,
        }
    }

    /// Idle unit of work over a fresh connection handle.
    pub fn unit_of_work(&self) -> UowResult<UnitOfWork<P::Connection>> {
        let connection = self.provider.connection()?;
        Ok(UnitOfWork::new(connection, self.factory.clone()))
    }

    /// Same database and constructors, acting as `user`.
    pub fn for_user(&self, user: CurrentUser) -> Self {
        Self {
            provider: Rc::clone(&self.provider),
            factory: self.factory.with_service(user),
        }
    }
}

impl<P: ConnectionProvider> Clone for UnitOfWorkFactory<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Rc::clone(&self.provider),
            factory: self.factory.clone(),
        }
    }
}
