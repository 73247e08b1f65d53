//! Domain model for users, lookup types, links and code snippets.
//!
//! # Responsibility
//! - Define the records persisted by the repositories.
//! - Validate user input before it reaches SQL.
//!
//! # Invariants
//! - Every entity is identified by a stable `Uuid`.
//! - `audit` is `None` until the record has been persisted.

pub mod code_snippet;
pub mod link;
pub mod lookup_type;
pub mod page;
pub mod user;
mod validation;

pub use validation::ValidationError;

use serde::{Deserialize, Serialize};

/// Who touched a record and when (epoch milliseconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    pub created_at: i64,
    pub created_by: String,
    pub updated_at: i64,
    pub updated_by: String,
}
