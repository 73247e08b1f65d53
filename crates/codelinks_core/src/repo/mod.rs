//! Repository contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define per-entity data access contracts.
//! - Keep SQL text and row mapping behind those contracts.
//! - Register every SQLite repository with the repository factory.
//!
//! # Invariants
//! - Every operation checks its bound transaction first; repositories kept past
//!   commit/rollback/dispose fail with `DbError::TransactionFinished`.
//! - Write paths validate the model before SQL mutations.
//! - Audit columns come from the injected `Clock` and `CurrentUser`.

pub mod code_snippet_repo;
pub mod link_repo;
pub mod lookup_type_repo;
pub mod user_repo;

use crate::db::{DbError, SqliteConnection};
use crate::model::code_snippet::CodeSnippet;
use crate::model::link::Link;
use crate::model::lookup_type::LookupType;
use crate::model::user::User;
use crate::model::{Audit, ValidationError};
use crate::uow::{RepositoryFactory, UnitOfWork, UowResult};
use code_snippet_repo::{CodeSnippetRepository, SqliteCodeSnippetRepository};
use link_repo::{LinkRepository, SqliteLinkRepository};
use lookup_type_repo::{LookupTypeRepository, SqliteLookupTypeRepository};
use rusqlite::types::Value;
use rusqlite::{ErrorCode, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;
use user_repo::{SqliteUserRepository, UserRepository};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    NotFound { entity: &'static str, id: Uuid },
    /// A unique or foreign-key constraint rejected the write.
    Conflict(String),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        match &value {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                Self::Conflict(message.clone().unwrap_or_else(|| failure.to_string()))
            }
            _ => Self::Db(DbError::Sqlite(value)),
        }
    }
}

/// Registers every SQLite repository with `factory`.
pub fn register_sqlite_repositories(factory: &mut RepositoryFactory<SqliteConnection>) {
    factory
        .register::<User, SqliteUserRepository>()
        .register::<LookupType, SqliteLookupTypeRepository>()
        .register::<Link, SqliteLinkRepository>()
        .register::<CodeSnippet, SqliteCodeSnippetRepository>();
}

/// Typed accessors for the SQLite repositories of one unit of work.
pub trait SqliteRepositories {
    fn users(&mut self) -> UowResult<Rc<dyn UserRepository>>;
    fn lookup_types(&mut self) -> UowResult<Rc<dyn LookupTypeRepository>>;
    fn links(&mut self) -> UowResult<Rc<dyn LinkRepository>>;
    fn code_snippets(&mut self) -> UowResult<Rc<dyn CodeSnippetRepository>>;
}

impl SqliteRepositories for UnitOfWork<SqliteConnection> {
    fn users(&mut self) -> UowResult<Rc<dyn UserRepository>> {
        self.repository::<User, dyn UserRepository, SqliteUserRepository>()
    }

    fn lookup_types(&mut self) -> UowResult<Rc<dyn LookupTypeRepository>> {
        self.repository::<LookupType, dyn LookupTypeRepository, SqliteLookupTypeRepository>()
    }

    fn links(&mut self) -> UowResult<Rc<dyn LinkRepository>> {
        self.repository::<Link, dyn LinkRepository, SqliteLinkRepository>()
    }

    fn code_snippets(&mut self) -> UowResult<Rc<dyn CodeSnippetRepository>> {
        self.repository::<CodeSnippet, dyn CodeSnippetRepository, SqliteCodeSnippetRepository>()
    }
}

/// Dynamic `WHERE` clause with positional binds.
#[derive(Debug, Default)]
pub(crate) struct SqlFilter {
    clauses: Vec<String>,
    binds: Vec<Value>,
}

impl SqlFilter {
    pub(crate) fn push(&mut self, clause: &str, values: impl IntoIterator<Item = Value>) {
        self.clauses.push(clause.to_string());
        self.binds.extend(values);
    }

    /// Adds a case-insensitive `LIKE` match of `term` against every column.
    pub(crate) fn search(&mut self, columns: &[&str], term: Option<&str>) {
        let Some(term) = term.map(str::trim).filter(|term| !term.is_empty()) else {
            return;
        };
        let pattern = like_pattern(term);
        let clause = columns
            .iter()
            .map(|column| format!("{column} LIKE ? ESCAPE '\\'"))
            .collect::<Vec<_>>()
            .join(" OR ");
        self.push(
            &format!("({clause})"),
            columns.iter().map(|_| Value::Text(pattern.clone())),
        );
    }

    pub(crate) fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub(crate) fn binds(&self) -> &[Value] {
        &self.binds
    }

    /// Binds followed by `LIMIT ? OFFSET ?` values.
    pub(crate) fn paged_binds(&self, limit: u32, offset: u64) -> Vec<Value> {
        let mut binds = self.binds.clone();
        binds.push(Value::Integer(i64::from(limit)));
        binds.push(Value::Integer(i64::try_from(offset).unwrap_or(i64::MAX)));
        binds
    }
}

/// Escapes `%`, `_` and `\` and wraps the term for a contains-match.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn parse_optional_uuid(value: Option<String>, column: &str) -> RepoResult<Option<Uuid>> {
    value.map(|text| parse_uuid(&text, column)).transpose()
}

pub(crate) fn parse_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean `{other}` in {column}"
        ))),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn audit_from_row(row: &Row<'_>) -> rusqlite::Result<Audit> {
    Ok(Audit {
        created_at: row.get("created_at")?,
        created_by: row.get("created_by")?,
        updated_at: row.get("updated_at")?,
        updated_by: row.get("updated_by")?,
    })
}

#[cfg(test)]
mod tests {
    use super::{like_pattern, SqlFilter};
    use rusqlite::types::Value;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn filter_builds_where_clause_and_binds() {
        let mut filter = SqlFilter::default();
        assert_eq!(filter.where_sql(), "");

        filter.push("owner_uuid = ?", [Value::Text("abc".to_string())]);
        filter.search(&["title", "url"], Some("  rust "));
        filter.search(&["title"], Some("   "));

        assert_eq!(
            filter.where_sql(),
            " WHERE owner_uuid = ? AND (title LIKE ? ESCAPE '\\' OR url LIKE ? ESCAPE '\\')"
        );
        assert_eq!(filter.binds().len(), 3);
        assert_eq!(filter.paged_binds(10, 20).len(), 5);
    }
}
