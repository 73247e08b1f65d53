//! Lookup types: small categorized code tables (link categories, languages).

use super::validation::{self, ValidationError};
use super::Audit;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type LookupTypeId = Uuid;

/// Category holding link categories.
pub const LINK_CATEGORY: &str = "link_category";
/// Category holding snippet programming languages.
pub const LANGUAGE: &str = "language";

const LABEL_MAX: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupType {
    pub id: LookupTypeId,
    pub category: String,
    pub code: String,
    pub label: String,
    pub sort_order: i32,
    pub is_active: bool,
    pub audit: Option<Audit>,
}

impl LookupType {
    pub fn new(
        category: impl Into<String>,
        code: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            category: category.into(),
            code: code.into(),
            label: label.into(),
            sort_order: 0,
            is_active: true,
            audit: None,
        }
    }

    pub fn with_sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::code("category", &self.category)?;
        validation::code("code", &self.code)?;
        validation::require_text("label", &self.label, LABEL_MAX)
    }
}
