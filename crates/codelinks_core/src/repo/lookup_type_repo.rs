//! Lookup type repository contract and SQLite implementation.
//!
//! # Invariants
//! - `(category, code)` is unique.
//! - Listing order is `sort_order ASC, label ASC`.

use super::{
    audit_from_row, bool_to_int, parse_bool, parse_uuid, RepoError, RepoResult, SqlFilter,
};
use crate::context::{Clock, CurrentUser};
use crate::db::SqliteConnection;
use crate::model::lookup_type::{LookupType, LookupTypeId};
use crate::model::page::{Page, PageRequest};
use crate::uow::{
    FactoryResult, IntoContract, ServiceResolver, TransactionBinding, TransactionalRepository,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use std::rc::Rc;

const LOOKUP_COLUMNS: &str = "uuid, category, code, label, sort_order, is_active,
    created_at, created_by, updated_at, updated_by";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupTypeQuery {
    pub category: Option<String>,
    /// Matches code or label.
    pub search: Option<String>,
    pub include_inactive: bool,
    pub page: PageRequest,
}

pub trait LookupTypeRepository {
    fn create_lookup_type(&self, lookup: &LookupType) -> RepoResult<LookupTypeId>;
    fn update_lookup_type(&self, lookup: &LookupType) -> RepoResult<()>;
    fn get_lookup_type(&self, id: LookupTypeId) -> RepoResult<Option<LookupType>>;
    fn find_by_code(&self, category: &str, code: &str) -> RepoResult<Option<LookupType>>;
    fn list_lookup_types(&self, query: &LookupTypeQuery) -> RepoResult<Page<LookupType>>;
    fn deactivate_lookup_type(&self, id: LookupTypeId) -> RepoResult<()>;
}

pub struct SqliteLookupTypeRepository {
    binding: TransactionBinding<SqliteConnection>,
    clock: Rc<dyn Clock>,
    current_user: Rc<CurrentUser>,
}

impl TransactionalRepository<SqliteConnection> for SqliteLookupTypeRepository {
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

impl IntoContract<dyn LookupTypeRepository> for SqliteLookupTypeRepository {
    fn into_contract(self: Rc<Self>) -> Rc<dyn LookupTypeRepository> {
        self
    }
}

impl LookupTypeRepository for SqliteLookupTypeRepository {
    fn create_lookup_type(&self, lookup: &LookupType) -> RepoResult<LookupTypeId> {
        lookup.validate()?;
        let now = self.clock.now_ms();
        let actor = self.current_user.username.as_str();

        self.binding.run(|conn| -> RepoResult<_> {
            conn.execute(
                "INSERT INTO lookup_types (
                    uuid, category, code, label, sort_order, is_active,
                    created_at, created_by, updated_at, updated_by
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?7, ?8);",
                params![
                    lookup.id.to_string(),
                    lookup.category.as_str(),
                    lookup.code.as_str(),
                    lookup.label.as_str(),
                    lookup.sort_order,
                    bool_to_int(lookup.is_active),
                    now,
                    actor,
                ],
            )?;
            Ok(lookup.id)
        })
    }

    fn update_lookup_type(&self, lookup: &LookupType) -> RepoResult<()> {
        lookup.validate()?;
        let now = self.clock.now_ms();
        let actor = self.current_user.username.as_str();

        self.binding.run(|conn| -> RepoResult<_> {
            let changed = conn.execute(
                "UPDATE lookup_types
                 SET category = ?2, code = ?3, label = ?4, sort_order = ?5, is_active = ?6,
                     updated_at = ?7, updated_by = ?8
                 WHERE uuid = ?1;",
                params![
                    lookup.id.to_string(),
                    lookup.category.as_str(),
                    lookup.code.as_str(),
                    lookup.label.as_str(),
                    lookup.sort_order,
                    bool_to_int(lookup.is_active),
                    now,
                    actor,
                ],
            )?;
            if changed == 0 {
                return Err(RepoError::NotFound {
                    entity: "lookup type",
                    id: lookup.id,
                });
            }
            Ok(())
        })
    }

    fn get_lookup_type(&self, id: LookupTypeId) -> RepoResult<Option<LookupType>> {
        self.binding.run(|conn| -> RepoResult<_> {
            let row = conn
                .query_row(
                    &format!("SELECT {LOOKUP_COLUMNS} FROM lookup_types WHERE uuid = ?1;"),
                    [id.to_string()],
                    |row| Ok(parse_lookup_row(row)),
                )
                .optional()?;
            row.transpose()
        })
    }

    fn find_by_code(&self, category: &str, code: &str) -> RepoResult<Option<LookupType>> {
        self.binding.run(|conn| -> RepoResult<_> {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {LOOKUP_COLUMNS} FROM lookup_types
                         WHERE category = ?1 AND code = ?2;"
                    ),
                    [category.trim(), code.trim()],
                    |row| Ok(parse_lookup_row(row)),
                )
                .optional()?;
            row.transpose()
        })
    }

    fn list_lookup_types(&self, query: &LookupTypeQuery) -> RepoResult<Page<LookupType>> {
        let mut filter = SqlFilter::default();
        if let Some(category) = query.category.as_deref() {
            filter.push("category = ?", [Value::Text(category.trim().to_string())]);
        }
        if !query.include_inactive {
            filter.push("is_active = 1", []);
        }
        filter.search(&["code", "label"], query.search.as_deref());

        self.binding.run(|conn| -> RepoResult<_> {
            let where_sql = filter.where_sql();
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM lookup_types{where_sql};"),
                params_from_iter(filter.binds()),
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {LOOKUP_COLUMNS} FROM lookup_types{where_sql}
                 ORDER BY category ASC, sort_order ASC, label ASC, uuid ASC
                 LIMIT ? OFFSET ?;"
            ))?;
            let mut rows = stmt.query(params_from_iter(
                filter.paged_binds(query.page.limit(), query.page.offset()),
            ))?;
            let mut items = Vec::new();
            while let Some(row) = rows.next()? {
                items.push(parse_lookup_row(row)?);
            }

            Ok(Page::new(items, query.page, u64::try_from(total).unwrap_or(0)))
        })
    }

    fn deactivate_lookup_type(&self, id: LookupTypeId) -> RepoResult<()> {
        let now = self.clock.now_ms();
        let actor = self.current_user.username.as_str();

        self.binding.run(|conn| -> RepoResult<_> {
            let changed = conn.execute(
                "UPDATE lookup_types SET is_active = 0, updated_at = ?2, updated_by = ?3
                 WHERE uuid = ?1;",
                params![id.to_string(), now, actor],
            )?;
            if changed == 0 {
                return Err(RepoError::NotFound {
                    entity: "lookup type",
                    id,
                });
            }
            Ok(())
        })
    }
}

fn parse_lookup_row(row: &Row<'_>) -> RepoResult<LookupType> {
    let uuid_text: String = row.get("uuid")?;
    Ok(LookupType {
        id: parse_uuid(&uuid_text, "lookup_types.uuid")?,
        category: row.get("category")?,
        code: row.get("code")?,
        label: row.get("label")?,
        sort_order: row.get("sort_order")?,
        is_active: parse_bool(row.get("is_active")?, "lookup_types.is_active")?,
        audit: Some(audit_from_row(row)?),
    })
}
