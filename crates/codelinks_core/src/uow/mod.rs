//! Transactional unit of work and repository resolution.
//!
//! # Responsibility
//! - Lazily establish one connection + transaction per activation cycle.
//! - Build repositories bound to that pair and cache them per transaction.
//! - Release the connection and transaction on every exit path.
//!
//! # Invariants
//! - At most one live transaction per `UnitOfWork`.
//! - Cached repositories never outlive the transaction they were built for.
//! - Nothing in this module is thread-safe; one unit of work serves one
//!   sequential caller.

mod binding;
mod cache;
mod container;
mod factory;
mod unit_of_work;

pub use binding::TransactionBinding;
pub use cache::{IntoContract, RepositoryCache, RepositoryKey};
pub use container::ServiceContainer;
pub use factory::{
    FactoryError, FactoryResult, RepositoryFactory, ServiceResolver, TransactionalRepository,
};
pub use unit_of_work::{UnitOfWork, UnitOfWorkError, UnitOfWorkFactory, UowResult};
