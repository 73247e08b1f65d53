//! Code snippet owned by a user and tagged with a language lookup.

use super::lookup_type::LookupTypeId;
use super::user::UserId;
use super::validation::{self, ValidationError};
use super::Audit;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type CodeSnippetId = Uuid;

const TITLE_MAX: usize = 200;
const CODE_MAX: usize = 100_000;
const DESCRIPTION_MAX: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSnippet {
    pub id: CodeSnippetId,
    pub owner_id: UserId,
    pub title: String,
    /// `language` lookup.
    pub language_id: LookupTypeId,
    pub code: String,
    pub description: Option<String>,
    pub audit: Option<Audit>,
}

impl CodeSnippet {
    pub fn new(
        owner_id: UserId,
        title: impl Into<String>,
        language_id: LookupTypeId,
        code: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            title: title.into(),
            language_id,
            code: code.into(),
            description: None,
            audit: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::require_text("title", &self.title, TITLE_MAX)?;
        validation::require_text("code", &self.code, CODE_MAX)?;
        validation::optional_text("description", self.description.as_deref(), DESCRIPTION_MAX)
    }
}
