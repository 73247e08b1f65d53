//! Wiring of the SQLite provider, service container and repository factory.

use crate::config::CoreConfig;
use crate::context::{Clock, CurrentUser, SystemClock};
use crate::db::{DbResult, SqliteConnection, SqliteConnectionProvider};
use crate::repo::register_sqlite_repositories;
use crate::uow::{RepositoryFactory, ServiceContainer, UnitOfWork, UnitOfWorkFactory};
use std::rc::Rc;

pub type SqliteUnitOfWork = UnitOfWork<SqliteConnection>;
pub type SqliteUnitOfWorkFactory = UnitOfWorkFactory<SqliteConnectionProvider>;

/// Container with the services every SQLite repository resolves.
pub fn default_services(current_user: CurrentUser) -> ServiceContainer {
    let mut services = ServiceContainer::new();
    services
        .register(current_user)
        .register_shared::<dyn Clock>(Rc::new(SystemClock));
    services
}

/// Repository factory with every SQLite repository registered.
pub fn sqlite_repository_factory(services: ServiceContainer) -> RepositoryFactory<SqliteConnection> {
    let mut factory = RepositoryFactory::new(services);
    register_sqlite_repositories(&mut factory);
    factory
}

pub fn unit_of_work_factory(
    provider: SqliteConnectionProvider,
    services: ServiceContainer,
) -> SqliteUnitOfWorkFactory {
    UnitOfWorkFactory::new(provider, sqlite_repository_factory(services))
}

/// Opens the configured database and returns a ready unit-of-work factory.
pub fn open_unit_of_work_factory(
    config: &CoreConfig,
    current_user: CurrentUser,
) -> DbResult<SqliteUnitOfWorkFactory> {
    let provider = SqliteConnectionProvider::open(config.database.clone(), config.busy_timeout)?;
    Ok(unit_of_work_factory(provider, default_services(current_user)))
}
