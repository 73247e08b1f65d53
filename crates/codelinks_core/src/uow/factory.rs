//! Repository factory.
//!
//! # Responsibility
//! - Keep a constructor table built once at startup, keyed by
//!   (entity, implementation).
//! - Build repositories bound to an explicit connection + transaction pair,
//!   resolving every other dependency from the service container.
//!
//! # Invariants
//! - The given connection and transaction are passed through unchanged.
//! - Unregistered pairs and unresolvable dependencies fail immediately.

use super::binding::TransactionBinding;
use super::container::ServiceContainer;
use crate::db::DbConnection;
use log::debug;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

pub type FactoryResult<T> = Result<T, FactoryError>;

/// Configuration errors raised while building a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactoryError {
    /// No constructor registered for this entity/implementation pair.
    NotRegistered {
        entity: &'static str,
        repository: &'static str,
    },
    /// A constructor dependency is missing from the service container.
    Unresolved {
        repository: &'static str,
        service: &'static str,
    },
}

impl Display for FactoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotRegistered { entity, repository } => write!(
                f,
                "repository `{repository}` is not registered for entity `{entity}`"
            ),
            Self::Unresolved {
                repository,
                service,
            } => write!(
                f,
                "cannot construct `{repository}`: service `{service}` is not registered"
            ),
        }
    }
}

impl Error for FactoryError {}

/// Repository implementation the factory knows how to construct.
pub trait TransactionalRepository<C: DbConnection>: Sized + 'static {
    /// Builds the repository around `binding`, pulling extras from `services`.
    fn construct(
        binding: TransactionBinding<C>,
        services: &ServiceResolver<'_>,
    ) -> FactoryResult<Self>;
}

/// Container view scoped to one repository construction.
pub struct ServiceResolver<'a> {
    container: &'a ServiceContainer,
    repository: &'static str,
}

impl ServiceResolver<'_> {
    pub fn resolve<T: ?Sized + 'static>(&self) -> FactoryResult<Rc<T>> {
        self.container
            .resolve::<T>()
            .ok_or(FactoryError::Unresolved {
                repository: self.repository,
                service: type_name::<T>(),
            })
    }
}

type Constructor<C> =
    fn(TransactionBinding<C>, &ServiceResolver<'_>) -> FactoryResult<Box<dyn Any>>;

fn construct_boxed<C, R>(
    binding: TransactionBinding<C>,
    services: &ServiceResolver<'_>,
) -> FactoryResult<Box<dyn Any>>
where
    C: DbConnection,
    R: TransactionalRepository<C>,
{
    R::construct(binding, services).map(|repository| Box::new(repository) as Box<dyn Any>)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ConstructorKey {
    entity: TypeId,
    repository: TypeId,
}

/// Builds repositories bound to a caller-supplied connection/transaction pair.
pub struct RepositoryFactory<C: DbConnection> {
    constructors: Rc<HashMap<ConstructorKey, Constructor<C>>>,
    services: ServiceContainer,
}

impl<C: DbConnection> RepositoryFactory<C> {
    pub fn new(services: ServiceContainer) -> Self {
        Self {
            constructors: Rc::new(HashMap::new()),
            services,
        }
    }

    /// Registers `R` as a constructible repository for entity `E`.
    pub fn register<E, R>(&mut self) -> &mut Self
    where
        E: 'static,
        R: TransactionalRepository<C>,
    {
        let key = ConstructorKey {
            entity: TypeId::of::<E>(),
            repository: TypeId::of::<R>(),
        };
        Rc::make_mut(&mut self.constructors).insert(key, construct_boxed::<C, R>);
        self
    }

    /// Derives a factory sharing the constructor table with one service overridden.
    pub fn with_service<T: 'static>(&self, service: T) -> Self {
        let mut services = self.services.clone();
        services.register(service);
        Self {
            constructors: Rc::clone(&self.constructors),
            services,
        }
    }

    /// Builds `R` for entity `E` bound to exactly `connection` and `transaction`.
    pub fn create_repository<E, R>(
        &self,
        connection: Rc<C>,
        transaction: Rc<C::Transaction>,
    ) -> FactoryResult<R>
    where
        E: 'static,
        R: TransactionalRepository<C>,
    {
        let not_registered = || FactoryError::NotRegistered {
            entity: type_name::<E>(),
            repository: type_name::<R>(),
        };
        let constructor = self
            .constructors
            .get(&ConstructorKey {
                entity: TypeId::of::<E>(),
                repository: TypeId::of::<R>(),
            })
            .ok_or_else(not_registered)?;

        let resolver = ServiceResolver {
            container: &self.services,
            repository: type_name::<R>(),
        };
        let repository = constructor(TransactionBinding::new(connection, transaction), &resolver)?;
        debug!(
            "event=repository_create module=uow status=ok repository={}",
            type_name::<R>()
        );
        repository
            .downcast::<R>()
            .map(|repository| *repository)
            .map_err(|_| not_registered())
    }
}

impl<C: DbConnection> Clone for RepositoryFactory<C> {
    fn clone(&self) -> Self {
        Self {
            constructors: Rc::clone(&self.constructors),
            services: self.services.clone(),
        }
    }
}
