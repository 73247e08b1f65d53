//! Core of CodeLinks: a transactional unit of work over SQLite repositories
//! for users, lookup types, links and code snippets.
//!
//! Every write path goes through a [`UnitOfWork`]; services open one per use
//! case and commit only on success.

pub mod bootstrap;
pub mod config;
pub mod context;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod uow;

pub use bootstrap::{
    default_services, open_unit_of_work_factory, unit_of_work_factory, SqliteUnitOfWork,
    SqliteUnitOfWorkFactory,
};
pub use config::{ConfigError, CoreConfig};
pub use context::{Clock, CurrentUser, ManualClock, SystemClock};
pub use db::{DbError, DbLocation, DbResult, SqliteConnectionProvider};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::page::{Page, PageRequest};
pub use repo::{RepoError, RepoResult, SqliteRepositories};
pub use service::code_snippet_service::{CodeSnippetService, SnippetInput};
pub use service::link_service::{LinkInput, LinkService};
pub use service::lookup_type_service::LookupTypeService;
pub use service::user_service::{RegisterUserRequest, UpdateProfileRequest, UserService};
pub use service::{ServiceError, ServiceResult};
pub use uow::{
    FactoryError, RepositoryFactory, ServiceContainer, UnitOfWork, UnitOfWorkError,
    UnitOfWorkFactory,
};

/// Health check used by the CLI.
pub fn ping() -> &'static str {
    "pong"
}

pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_matches_manifest() {
        assert_eq!(core_version(), env!("CARGO_PKG_VERSION"));
    }
}
