//! Code snippet repository contract and SQLite implementation.

use super::{audit_from_row, parse_uuid, RepoError, RepoResult, SqlFilter};
use crate::context::{Clock, CurrentUser};
use crate::db::SqliteConnection;
use crate::model::code_snippet::{CodeSnippet, CodeSnippetId};
use crate::model::lookup_type::LookupTypeId;
use crate::model::page::{Page, PageRequest};
use crate::model::user::UserId;
use crate::uow::{
    FactoryResult, IntoContract, ServiceResolver, TransactionBinding, TransactionalRepository,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use std::rc::Rc;

const SNIPPET_COLUMNS: &str = "uuid, owner_uuid, title, language_uuid, code, description,
    created_at, created_by, updated_at, updated_by";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeSnippetQuery {
    pub owner_id: Option<UserId>,
    pub language_id: Option<LookupTypeId>,
    /// Matches title, description or code.
    pub search: Option<String>,
    pub page: PageRequest,
}

pub trait CodeSnippetRepository {
    fn create_snippet(&self, snippet: &CodeSnippet) -> RepoResult<CodeSnippetId>;
    fn update_snippet(&self, snippet: &CodeSnippet) -> RepoResult<()>;
    fn get_snippet(&self, id: CodeSnippetId) -> RepoResult<Option<CodeSnippet>>;
    fn list_snippets(&self, query: &CodeSnippetQuery) -> RepoResult<Page<CodeSnippet>>;
    fn delete_snippet(&self, id: CodeSnippetId) -> RepoResult<()>;
}

pub struct SqliteCodeSnippetRepository {
    binding: TransactionBinding<SqliteConnection>,
    clock: Rc<dyn Clock>,
    current_user: Rc<CurrentUser>,
}

impl TransactionalRepository<SqliteConnection> for SqliteCodeSnippetRepository {
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

impl IntoContract<dyn CodeSnippetRepository> for SqliteCodeSnippetRepository {
    fn into_contract(self: Rc<Self>) -> Rc<dyn CodeSnippetRepository> {
        self
    }
}

impl CodeSnippetRepository for SqliteCodeSnippetRepository {
    fn create_snippet(&self, snippet: &CodeSnippet) -> RepoResult<CodeSnippetId> {
        snippet.validate()?;
        let now = self.clock.now_ms();
        let actor = self.current_user.username.as_str();

        self.binding.run(|conn| -> RepoResult<_> {
            conn.execute(
                "INSERT INTO code_snippets (
                    uuid, owner_uuid, title, language_uuid, code, description,
                    created_at, created_by, updated_at, updated_by
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?7, ?8);",
                params![
                    snippet.id.to_string(),
                    snippet.owner_id.to_string(),
                    snippet.title.as_str(),
                    snippet.language_id.to_string(),
                    snippet.code.as_str(),
                    snippet.description.as_deref(),
                    now,
                    actor,
                ],
            )?;
            Ok(snippet.id)
        })
    }

    fn update_snippet(&self, snippet: &CodeSnippet) -> RepoResult<()> {
        snippet.validate()?;
        let now = self.clock.now_ms();
        let actor = self.current_user.username.as_str();

        self.binding.run(|conn| -> RepoResult<_> {
            let changed = conn.execute(
                "UPDATE code_snippets
                 SET title = ?2, language_uuid = ?3, code = ?4, description = ?5,
                     updated_at = ?6, updated_by = ?7
                 WHERE uuid = ?1;",
                params![
                    snippet.id.to_string(),
                    snippet.title.as_str(),
                    snippet.language_id.to_string(),
                    snippet.code.as_str(),
                    snippet.description.as_deref(),
                    now,
                    actor,
                ],
            )?;
            ensure_changed(changed, snippet.id)
        })
    }

    fn get_snippet(&self, id: CodeSnippetId) -> RepoResult<Option<CodeSnippet>> {
        self.binding.run(|conn| -> RepoResult<_> {
            let row = conn
                .query_row(
                    &format!("SELECT {SNIPPET_COLUMNS} FROM code_snippets WHERE uuid = ?1;"),
                    [id.to_string()],
                    |row| Ok(parse_snippet_row(row)),
                )
                .optional()?;
            row.transpose()
        })
    }

    fn list_snippets(&self, query: &CodeSnippetQuery) -> RepoResult<Page<CodeSnippet>> {
        let mut filter = SqlFilter::default();
        if let Some(owner_id) = query.owner_id {
            filter.push("owner_uuid = ?", [Value::Text(owner_id.to_string())]);
        }
        if let Some(language_id) = query.language_id {
            filter.push("language_uuid = ?", [Value::Text(language_id.to_string())]);
        }
        filter.search(&["title", "description", "code"], query.search.as_deref());

        self.binding.run(|conn| -> RepoResult<_> {
            let where_sql = filter.where_sql();
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM code_snippets{where_sql};"),
                params_from_iter(filter.binds()),
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {SNIPPET_COLUMNS} FROM code_snippets{where_sql}
                 ORDER BY updated_at DESC, uuid ASC
                 LIMIT ? OFFSET ?;"
            ))?;
            let mut rows = stmt.query(params_from_iter(
                filter.paged_binds(query.page.limit(), query.page.offset()),
            ))?;
            let mut snippets = Vec::new();
            while let Some(row) = rows.next()? {
                snippets.push(parse_snippet_row(row)?);
            }

            Ok(Page::new(
                snippets,
                query.page,
                u64::try_from(total).unwrap_or(0),
            ))
        })
    }

    fn delete_snippet(&self, id: CodeSnippetId) -> RepoResult<()> {
        self.binding.run(|conn| -> RepoResult<_> {
            let changed = conn.execute(
                "DELETE FROM code_snippets WHERE uuid = ?1;",
                [id.to_string()],
            )?;
            ensure_changed(changed, id)
        })
    }
}

fn ensure_changed(changed: usize, id: CodeSnippetId) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::NotFound {
            entity: "code snippet",
            id,
        });
    }
    Ok(())
}

fn parse_snippet_row(row: &Row<'_>) -> RepoResult<CodeSnippet> {
    let uuid_text: String = row.get("uuid")?;
    let owner_text: String = row.get("owner_uuid")?;
    let language_text: String = row.get("language_uuid")?;
    Ok(CodeSnippet {
        id: parse_uuid(&uuid_text, "code_snippets.uuid")?,
        owner_id: parse_uuid(&owner_text, "code_snippets.owner_uuid")?,
        title: row.get("title")?,
        language_id: parse_uuid(&language_text, "code_snippets.language_uuid")?,
        code: row.get("code")?,
        description: row.get("description")?,
        audit: Some(audit_from_row(row)?),
    })
}
