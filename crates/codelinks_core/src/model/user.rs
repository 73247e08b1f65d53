//! User account model.

use super::validation::{self, ValidationError};
use super::Audit;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;

const DISPLAY_NAME_MAX: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub is_active: bool,
    pub audit: Option<Audit>,
}

impl User {
    /// Creates an active, not yet persisted user with a generated id.
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            display_name: None,
            is_active: true,
            audit: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::username(&self.username)?;
        validation::email(&self.email)?;
        validation::optional_text("display_name", self.display_name.as_deref(), DISPLAY_NAME_MAX)
    }
}
