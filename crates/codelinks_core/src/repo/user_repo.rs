//! User repository contract and SQLite implementation.
//!
//! # Invariants
//! - Usernames and emails are unique, case-insensitively.
//! - Users are deactivated, never deleted; links and snippets keep pointing at them.

use super::{
    audit_from_row, bool_to_int, parse_bool, parse_uuid, RepoError, RepoResult, SqlFilter,
};
use crate::context::{Clock, CurrentUser};
use crate::db::SqliteConnection;
use crate::model::page::{Page, PageRequest};
use crate::model::user::{User, UserId};
use crate::uow::{
    FactoryResult, IntoContract, ServiceResolver, TransactionBinding, TransactionalRepository,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::rc::Rc;

const USER_COLUMNS: &str = "uuid, username, email, display_name, is_active,
    created_at, created_by, updated_at, updated_by";

/// Query options for listing users.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserListQuery {
    /// Matches username, email or display name.
    pub search: Option<String>,
    pub include_inactive: bool,
    pub page: PageRequest,
}

pub trait UserRepository {
    fn create_user(&self, user: &User) -> RepoResult<UserId>;
    fn update_user(&self, user: &User) -> RepoResult<()>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    fn find_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    fn list_users(&self, query: &UserListQuery) -> RepoResult<Page<User>>;
    fn set_active(&self, id: UserId, is_active: bool) -> RepoResult<()>;
}

/// SQLite-backed user repository bound to one transaction.
pub struct SqliteUserRepository {
    binding: TransactionBinding<SqliteConnection>,
    clock: Rc<dyn Clock>,
    current_user: Rc<CurrentUser>,
}

impl SqliteUserRepository {
    pub fn binding(&self) -> &TransactionBinding<SqliteConnection> {
        &self.binding
    }
}

impl TransactionalRepository<SqliteConnection> for SqliteUserRepository {
    fn construct(
        binding: TransactionBinding<SqliteConnection>,
        services: &ServiceResolver<'_>,
    ) -> FactoryResult<Self> {
        Ok(Self {
            binding,
            clock: services.resolve::<dyn Clock>()?,
            current_user: services.resolve::<CurrentUser>()?,
        })
    }
}

impl IntoContract<dyn UserRepository> for SqliteUserRepository {
    fn into_contract(self: Rc<Self>) -> Rc<dyn UserRepository> {
        self
    }
}

impl UserRepository for SqliteUserRepository {
    fn create_user(&self, user: &User) -> RepoResult<UserId> {
        user.validate()?;
        let now = self.clock.now_ms();
        let actor = self.current_user.username.as_str();

        self.binding.run(|conn| -> RepoResult<_> {
            conn.execute(
                "INSERT INTO users (
                    uuid, username, email, display_name, is_active,
                    created_at, created_by, updated_at, updated_by
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?6, ?7);",
                params![
                    user.id.to_string(),
                    user.username.as_str(),
                    user.email.as_str(),
                    user.display_name.as_deref(),
                    bool_to_int(user.is_active),
                    now,
                    actor,
                ],
            )?;
            Ok(user.id)
        })
    }

    fn update_user(&self, user: &User) -> RepoResult<()> {
        user.validate()?;
        let now = self.clock.now_ms();
        let actor = self.current_user.username.as_str();

        self.binding.run(|conn| -> RepoResult<_> {
            let changed = conn.execute(
                "UPDATE users
                 SET username = ?2, email = ?3, display_name = ?4, is_active = ?5,
                     updated_at = ?6, updated_by = ?7
                 WHERE uuid = ?1;",
                params![
                    user.id.to_string(),
                    user.username.as_str(),
                    user.email.as_str(),
                    user.display_name.as_deref(),
                    bool_to_int(user.is_active),
                    now,
                    actor,
                ],
            )?;
            ensure_changed(changed, user.id)
        })
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        self.binding.run(|conn| -> RepoResult<_> {
            query_one(
                conn,
                &format!("SELECT {USER_COLUMNS} FROM users WHERE uuid = ?1;"),
                id.to_string(),
            )
        })
    }

    fn find_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        self.binding.run(|conn| -> RepoResult<_> {
            query_one(
                conn,
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1 COLLATE NOCASE;"),
                username.trim().to_string(),
            )
        })
    }

    fn list_users(&self, query: &UserListQuery) -> RepoResult<Page<User>> {
        let mut filter = SqlFilter::default();
        if !query.include_inactive {
            filter.push("is_active = 1", []);
        }
        filter.search(
            &["username", "email", "display_name"],
            query.search.as_deref(),
        );

        self.binding.run(|conn| -> RepoResult<_> {
            let where_sql = filter.where_sql();
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM users{where_sql};"),
                params_from_iter(filter.binds()),
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users{where_sql}
                 ORDER BY username COLLATE NOCASE ASC, uuid ASC
                 LIMIT ? OFFSET ?;"
            ))?;
            let mut rows = stmt.query(params_from_iter(
                filter.paged_binds(query.page.limit(), query.page.offset()),
            ))?;
            let mut users = Vec::new();
            while let Some(row) = rows.next()? {
                users.push(parse_user_row(row)?);
            }

            Ok(Page::new(users, query.page, u64::try_from(total).unwrap_or(0)))
        })
    }

    fn set_active(&self, id: UserId, is_active: bool) -> RepoResult<()> {
        let now = self.clock.now_ms();
        let actor = self.current_user.username.as_str();

        self.binding.run(|conn| -> RepoResult<_> {
            let changed = conn.execute(
                "UPDATE users SET is_active = ?2, updated_at = ?3, updated_by = ?4
                 WHERE uuid = ?1;",
                params![id.to_string(), bool_to_int(is_active), now, actor],
            )?;
            ensure_changed(changed, id)
        })
    }
}

fn query_one(conn: &Connection, sql: &str, key: String) -> RepoResult<Option<User>> {
    let mut stmt = conn.prepare(sql)?;
    let row = stmt
        .query_row([Value::Text(key)], |row| Ok(parse_user_row(row)))
        .optional()?;
    row.transpose()
}

fn ensure_changed(changed: usize, id: UserId) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::NotFound { entity: "user", id });
    }
    Ok(())
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let uuid_text: String = row.get("uuid")?;
    let user = User {
        id: parse_uuid(&uuid_text, "users.uuid")?,
        username: row.get("username")?,
        email: row.get("email")?,
        display_name: row.get("display_name")?,
        is_active: parse_bool(row.get("is_active")?, "users.is_active")?,
        audit: Some(audit_from_row(row)?),
    };
    Ok(user)
}
