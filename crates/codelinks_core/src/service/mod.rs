//! Application use-case services.
//!
//! # Responsibility
//! - Run each use case inside exactly one unit of work.
//! - Perform cross-entity checks in the same transaction as the write.
//!
//! # Invariants
//! - A use case commits only when it returns `Ok`; any error rolls back and
//!   is returned unchanged.

pub mod code_snippet_service;
pub mod link_service;
pub mod lookup_type_service;
pub mod user_service;

use crate::bootstrap::{SqliteUnitOfWork, SqliteUnitOfWorkFactory};
use crate::model::lookup_type::LookupType;
use crate::model::user::{User, UserId};
use crate::model::ValidationError;
use crate::repo::{RepoError, SqliteRepositories};
use crate::uow::UnitOfWorkError;
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug)]
pub enum ServiceError {
    Validation(ValidationError),
    NotFound { entity: &'static str, id: Uuid },
    UnknownLookup { category: String, code: String },
    Conflict(String),
    Inactive { entity: &'static str, id: Uuid },
    Repo(RepoError),
    UnitOfWork(UnitOfWorkError),
    /// Write succeeded but the read-back did not find the row.
    InconsistentState(&'static str),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::UnknownLookup { category, code } => {
                write!(f, "unknown {category} `{code}`")
            }
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::Inactive { entity, id } => write!(f, "{entity} is inactive: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::UnitOfWork(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent state: {details}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::UnitOfWork(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<UnitOfWorkError> for ServiceError {
    fn from(value: UnitOfWorkError) -> Self {
        Self::UnitOfWork(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::Conflict(message) => Self::Conflict(message),
            other => Self::Repo(other),
        }
    }
}

/// Runs `work` in a fresh unit of work, committing on success.
pub(crate) fn in_unit_of_work<T>(
    units: &SqliteUnitOfWorkFactory,
    work: impl FnOnce(&mut SqliteUnitOfWork) -> ServiceResult<T>,
) -> ServiceResult<T> {
    let mut uow = units.unit_of_work()?;
    match work(&mut uow) {
        Ok(value) => {
            uow.commit_changes()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback_changes() {
                warn!("event=service_rollback module=service status=error error={rollback_err}");
            }
            Err(err)
        }
    }
}

/// Loads `owner_id` and rejects missing or deactivated users.
pub(crate) fn require_active_user(
    uow: &mut SqliteUnitOfWork,
    owner_id: UserId,
) -> ServiceResult<User> {
    let user = uow
        .users()?
        .get_user(owner_id)?
        .ok_or(ServiceError::NotFound {
            entity: "user",
            id: owner_id,
        })?;
    if !user.is_active {
        return Err(ServiceError::Inactive {
            entity: "user",
            id: owner_id,
        });
    }
    Ok(user)
}

/// Resolves an active lookup by `(category, code)`.
pub(crate) fn resolve_lookup(
    uow: &mut SqliteUnitOfWork,
    category: &str,
    code: &str,
) -> ServiceResult<LookupType> {
    let normalized = code.trim().to_ascii_lowercase();
    match uow.lookup_types()?.find_by_code(category, &normalized)? {
        Some(lookup) if lookup.is_active => Ok(lookup),
        _ => Err(ServiceError::UnknownLookup {
            category: category.to_string(),
            code: normalized,
        }),
    }
}
