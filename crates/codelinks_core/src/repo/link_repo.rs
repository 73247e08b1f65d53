//! Link repository contract and SQLite implementation.
//!
//! # Invariants
//! - Listing order is `updated_at DESC, uuid ASC`.
//! - Owner and category references are enforced by foreign keys.

use super::{audit_from_row, parse_optional_uuid, parse_uuid, RepoError, RepoResult, SqlFilter};
use crate::context::{Clock, CurrentUser};
use crate::db::SqliteConnection;
use crate::model::link::{Link, LinkId};
use crate::model::lookup_type::LookupTypeId;
use crate::model::page::{Page, PageRequest};
use crate::model::user::UserId;
use crate::uow::{
    FactoryResult, IntoContract, ServiceResolver, TransactionBinding, TransactionalRepository,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use std::rc::Rc;

const LINK_COLUMNS: &str = "uuid, owner_uuid, url, title, description, category_uuid,
    created_at, created_by, updated_at, updated_by";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkListQuery {
    pub owner_id: Option<UserId>,
    pub category_id: Option<LookupTypeId>,
    /// Matches title, url or description.
    pub search: Option<String>,
    pub page: PageRequest,
}

pub trait LinkRepository {
    fn create_link(&self, link: &Link) -> RepoResult<LinkId>;
    fn update_link(&self, link: &Link) -> RepoResult<()>;
    fn get_link(&self, id: LinkId) -> RepoResult<Option<Link>>;
    fn list_links(&self, query: &LinkListQuery) -> RepoResult<Page<Link>>;
    fn delete_link(&self, id: LinkId) -> RepoResult<()>;
}

pub struct SqliteLinkRepository {
    binding: TransactionBinding<SqliteConnection>,
    clock: Rc<dyn Clock>,
    current_user: Rc<CurrentUser>,
}

impl TransactionalRepository<SqliteConnection> for SqliteLinkRepository {
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

impl IntoContract<dyn LinkRepository> for SqliteLinkRepository {
    fn into_contract(self: Rc<Self>) -> Rc<dyn LinkRepository> {
        self
    }
}

impl LinkRepository for SqliteLinkRepository {
    fn create_link(&self, link: &Link) -> RepoResult<LinkId> {
        link.validate()?;
        let now = self.clock.now_ms();
        let actor = self.current_user.username.as_str();

        self.binding.run(|conn| -> RepoResult<_> {
            conn.execute(
                "INSERT INTO links (
                    uuid, owner_uuid, url, title, description, category_uuid,
                    created_at, created_by, updated_at, updated_by
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?7, ?8);",
                params![
                    link.id.to_string(),
                    link.owner_id.to_string(),
                    link.url.as_str(),
                    link.title.as_str(),
                    link.description.as_deref(),
                    link.category_id.map(|id| id.to_string()),
                    now,
                    actor,
                ],
            )?;
            Ok(link.id)
        })
    }

    fn update_link(&self, link: &Link) -> RepoResult<()> {
        link.validate()?;
        let now = self.clock.now_ms();
        let actor = self.current_user.username.as_str();

        self.binding.run(|conn| -> RepoResult<_> {
            let changed = conn.execute(
                "UPDATE links
                 SET url = ?2, title = ?3, description = ?4, category_uuid = ?5,
                     updated_at = ?6, updated_by = ?7
                 WHERE uuid = ?1;",
                params![
                    link.id.to_string(),
                    link.url.as_str(),
                    link.title.as_str(),
                    link.description.as_deref(),
                    link.category_id.map(|id| id.to_string()),
                    now,
                    actor,
                ],
            )?;
            ensure_changed(changed, link.id)
        })
    }

    fn get_link(&self, id: LinkId) -> RepoResult<Option<Link>> {
        self.binding.run(|conn| -> RepoResult<_> {
            let row = conn
                .query_row(
                    &format!("SELECT {LINK_COLUMNS} FROM links WHERE uuid = ?1;"),
                    [id.to_string()],
                    |row| Ok(parse_link_row(row)),
                )
                .optional()?;
            row.transpose()
        })
    }

    fn list_links(&self, query: &LinkListQuery) -> RepoResult<Page<Link>> {
        let mut filter = SqlFilter::default();
        if let Some(owner_id) = query.owner_id {
            filter.push("owner_uuid = ?", [Value::Text(owner_id.to_string())]);
        }
        if let Some(category_id) = query.category_id {
            filter.push("category_uuid = ?", [Value::Text(category_id.to_string())]);
        }
        filter.search(&["title", "url", "description"], query.search.as_deref());

        self.binding.run(|conn| -> RepoResult<_> {
            let where_sql = filter.where_sql();
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM links{where_sql};"),
                params_from_iter(filter.binds()),
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {LINK_COLUMNS} FROM links{where_sql}
                 ORDER BY updated_at DESC, uuid ASC
                 LIMIT ? OFFSET ?;"
            ))?;
            let mut rows = stmt.query(params_from_iter(
                filter.paged_binds(query.page.limit(), query.page.offset()),
            ))?;
            let mut links = Vec::new();
            while let Some(row) = rows.next()? {
                links.push(parse_link_row(row)?);
            }

            Ok(Page::new(links, query.page, u64::try_from(total).unwrap_or(0)))
        })
    }

    fn delete_link(&self, id: LinkId) -> RepoResult<()> {
        self.binding.run(|conn| -> RepoResult<_> {
            let changed = conn.execute("DELETE FROM links WHERE uuid = ?1;", [id.to_string()])?;
            ensure_changed(changed, id)
        })
    }
}

fn ensure_changed(changed: usize, id: LinkId) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::NotFound { entity: "link", id });
    }
    Ok(())
}

fn parse_link_row(row: &Row<'_>) -> RepoResult<Link> {
    let uuid_text: String = row.get("uuid")?;
    let owner_text: String = row.get("owner_uuid")?;
    Ok(Link {
        id: parse_uuid(&uuid_text, "links.uuid")?,
        owner_id: parse_uuid(&owner_text, "links.owner_uuid")?,
        url: row.get("url")?,
        title: row.get("title")?,
        description: row.get("description")?,
        category_id: parse_optional_uuid(row.get("category_uuid")?, "links.category_uuid")?,
        audit: Some(audit_from_row(row)?),
    })
}
