//! Link use cases.
//!
//! Owner and category checks run in the same unit of work as the write, so a
//! user deactivated concurrently cannot receive a new link.

use super::{in_unit_of_work, require_active_user, resolve_lookup, ServiceError, ServiceResult};
use crate::bootstrap::{SqliteUnitOfWork, SqliteUnitOfWorkFactory};
use crate::model::link::{Link, LinkId};
use crate::model::lookup_type::{LookupTypeId, LINK_CATEGORY};
use crate::model::page::Page;
use crate::model::user::UserId;
use crate::repo::link_repo::LinkListQuery;
use crate::repo::SqliteRepositories;

/// Input for creating or replacing a link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkInput {
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    /// `link_category` lookup code.
    pub category_code: Option<String>,
}

pub struct LinkService {
    units: SqliteUnitOfWorkFactory,
}

impl LinkService {
    pub fn new(units: SqliteUnitOfWorkFactory) -> Self {
        Self { units }
    }

    pub fn add_link(&self, owner_id: UserId, input: &LinkInput) -> ServiceResult<Link> {
        let mut link = Link::new(owner_id, input.url.trim(), input.title.trim());
        link.description = input.description.clone();
        link.validate()?;

        in_unit_of_work(&self.units, |uow| {
            require_active_user(uow, owner_id)?;
            link.category_id = resolve_category(uow, input.category_code.as_deref())?;

            let links = uow.links()?;
            links.create_link(&link)?;
            links
                .get_link(link.id)?
                .ok_or(ServiceError::InconsistentState("created link missing on read-back"))
        })
    }

    pub fn update_link(&self, id: LinkId, input: &LinkInput) -> ServiceResult<Link> {
        in_unit_of_work(&self.units, |uow| {
            let category_id = resolve_category(uow, input.category_code.as_deref())?;
            let links = uow.links()?;
            let mut link = links
                .get_link(id)?
                .ok_or(ServiceError::NotFound { entity: "link", id })?;
            link.url = input.url.trim().to_string();
            link.title = input.title.trim().to_string();
            link.description = input.description.clone();
            link.category_id = category_id;
            links.update_link(&link)?;
            links
                .get_link(id)?
                .ok_or(ServiceError::InconsistentState("updated link missing on read-back"))
        })
    }

    pub fn get_link(&self, id: LinkId) -> ServiceResult<Link> {
        in_unit_of_work(&self.units, |uow| {
            uow.links()?
                .get_link(id)?
                .ok_or(ServiceError::NotFound { entity: "link", id })
        })
    }

    pub fn list_links(&self, query: &LinkListQuery) -> ServiceResult<Page<Link>> {
        in_unit_of_work(&self.units, |uow| Ok(uow.links()?.list_links(query)?))
    }

    pub fn delete_link(&self, id: LinkId) -> ServiceResult<()> {
        in_unit_of_work(&self.units, |uow| Ok(uow.links()?.delete_link(id)?))
    }
}

fn resolve_category(
    uow: &mut SqliteUnitOfWork,
    code: Option<&str>,
) -> ServiceResult<Option<LookupTypeId>> {
    match code.map(str::trim).filter(|code| !code.is_empty()) {
        Some(code) => Ok(Some(resolve_lookup(uow, LINK_CATEGORY, code)?.id)),
        None => Ok(None),
    }
}
