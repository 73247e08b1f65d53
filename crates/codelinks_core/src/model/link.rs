//! Saved web link owned by a user.

use super::lookup_type::LookupTypeId;
use super::user::UserId;
use super::validation::{self, ValidationError};
use super::Audit;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type LinkId = Uuid;

const TITLE_MAX: usize = 200;
const DESCRIPTION_MAX: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub owner_id: UserId,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    /// `link_category` lookup, optional.
    pub category_id: Option<LookupTypeId>,
    pub audit: Option<Audit>,
}

impl Link {
    pub fn new(owner_id: UserId, url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            url: url.into(),
            title: title.into(),
            description: None,
            category_id: None,
            audit: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::url(&self.url)?;
        validation::require_text("title", &self.title, TITLE_MAX)?;
        validation::optional_text("description", self.description.as_deref(), DESCRIPTION_MAX)
    }
}
