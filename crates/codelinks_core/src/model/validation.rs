//! Field validation shared by entity models.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]{2,31}$").expect("valid username regex"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex")
});
static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("valid url regex"));
static CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_]*$").expect("valid lookup code regex"));

/// Validation failures for entity fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Empty(&'static str),
    TooLong { field: &'static str, max: usize },
    InvalidUsername(String),
    InvalidEmail(String),
    InvalidUrl(String),
    InvalidCode { field: &'static str, value: String },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty(field) => write!(f, "`{field}` must not be empty"),
            Self::TooLong { field, max } => {
                write!(f, "`{field}` must be at most {max} characters")
            }
            Self::InvalidUsername(value) => write!(f, "invalid username `{value}`"),
            Self::InvalidEmail(value) => write!(f, "invalid email `{value}`"),
            Self::InvalidUrl(value) => write!(f, "invalid url `{value}`"),
            Self::InvalidCode { field, value } => {
                write!(f, "`{field}` must be lowercase snake_case, got `{value}`")
            }
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn require_text(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty(field));
    }
    optional_text(field, Some(value), max)
}

pub(crate) fn optional_text(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<(), ValidationError> {
    match value {
        Some(text) if text.chars().count() > max => Err(ValidationError::TooLong { field, max }),
        _ => Ok(()),
    }
}

pub(crate) fn username(value: &str) -> Result<(), ValidationError> {
    if USERNAME_RE.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidUsername(value.to_string()))
    }
}

pub(crate) fn email(value: &str) -> Result<(), ValidationError> {
    if value.len() <= 254 && EMAIL_RE.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(value.to_string()))
    }
}

pub(crate) fn url(value: &str) -> Result<(), ValidationError> {
    if value.len() <= 2048 && URL_RE.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidUrl(value.to_string()))
    }
}

pub(crate) fn code(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.len() <= 64 && CODE_RE.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidCode {
            field,
            value: value.to_string(),
        })
    }
}
