//! Code snippet use cases.

use super::{in_unit_of_work, require_active_user, resolve_lookup, ServiceError, ServiceResult};
use crate::bootstrap::SqliteUnitOfWorkFactory;
use crate::model::code_snippet::{CodeSnippet, CodeSnippetId};
use crate::model::lookup_type::LANGUAGE;
use crate::model::page::Page;
use crate::model::user::UserId;
use crate::repo::code_snippet_repo::CodeSnippetQuery;
use crate::repo::SqliteRepositories;

/// Input for creating or replacing a snippet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnippetInput {
    pub title: String,
    /// `language` lookup code.
    pub language_code: String,
    pub code: String,
    pub description: Option<String>,
}

pub struct CodeSnippetService {
    units: SqliteUnitOfWorkFactory,
}

impl CodeSnippetService {
    pub fn new(units: SqliteUnitOfWorkFactory) -> Self {
        Self { units }
    }

    pub fn create_snippet(
        &self,
        owner_id: UserId,
        input: &SnippetInput,
    ) -> ServiceResult<CodeSnippet> {
        in_unit_of_work(&self.units, |uow| {
            require_active_user(uow, owner_id)?;
            let language = resolve_lookup(uow, LANGUAGE, &input.language_code)?;

            let mut snippet =
                CodeSnippet::new(owner_id, input.title.trim(), language.id, input.code.clone());
            snippet.description = input.description.clone();

            let snippets = uow.code_snippets()?;
            snippets.create_snippet(&snippet)?;
            snippets
                .get_snippet(snippet.id)?
                .ok_or(ServiceError::InconsistentState(
                    "created snippet missing on read-back",
                ))
        })
    }

    pub fn update_snippet(
        &self,
        id: CodeSnippetId,
        input: &SnippetInput,
    ) -> ServiceResult<CodeSnippet> {
        in_unit_of_work(&self.units, |uow| {
            let language = resolve_lookup(uow, LANGUAGE, &input.language_code)?;
            let snippets = uow.code_snippets()?;
            let mut snippet = snippets.get_snippet(id)?.ok_or(ServiceError::NotFound {
                entity: "code snippet",
                id,
            })?;
            snippet.title = input.title.trim().to_string();
            snippet.language_id = language.id;
            snippet.code = input.code.clone();
            snippet.description = input.description.clone();
            snippets.update_snippet(&snippet)?;
            snippets
                .get_snippet(id)?
                .ok_or(ServiceError::InconsistentState(
                    "updated snippet missing on read-back",
                ))
        })
    }

    pub fn get_snippet(&self, id: CodeSnippetId) -> ServiceResult<CodeSnippet> {
        in_unit_of_work(&self.units, |uow| {
            uow.code_snippets()?
                .get_snippet(id)?
                .ok_or(ServiceError::NotFound {
                    entity: "code snippet",
                    id,
                })
        })
    }

    pub fn list_snippets(&self, query: &CodeSnippetQuery) -> ServiceResult<Page<CodeSnippet>> {
        in_unit_of_work(&self.units, |uow| Ok(uow.code_snippets()?.list_snippets(query)?))
    }

    pub fn delete_snippet(&self, id: CodeSnippetId) -> ServiceResult<()> {
        in_unit_of_work(&self.units, |uow| Ok(uow.code_snippets()?.delete_snippet(id)?))
    }
}
