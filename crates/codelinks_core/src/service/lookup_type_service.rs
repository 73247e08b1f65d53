//! Lookup type use cases, including seeding of the default code tables.

use super::{in_unit_of_work, resolve_lookup, ServiceError, ServiceResult};
use crate::bootstrap::SqliteUnitOfWorkFactory;
use crate::model::lookup_type::{LookupType, LookupTypeId, LANGUAGE, LINK_CATEGORY};
use crate::model::page::{Page, PageRequest};
use crate::repo::lookup_type_repo::LookupTypeQuery;
use crate::repo::SqliteRepositories;
use log::info;

const DEFAULT_LOOKUPS: &[(&str, &str, &str)] = &[
    (LINK_CATEGORY, "documentation", "Documentation"),
    (LINK_CATEGORY, "article", "Article"),
    (LINK_CATEGORY, "video", "Video"),
    (LINK_CATEGORY, "tool", "Tool"),
    (LANGUAGE, "rust", "Rust"),
    (LANGUAGE, "python", "Python"),
    (LANGUAGE, "sql", "SQL"),
    (LANGUAGE, "shell", "Shell"),
    (LANGUAGE, "typescript", "TypeScript"),
];

pub struct LookupTypeService {
    units: SqliteUnitOfWorkFactory,
}

impl LookupTypeService {
    pub fn new(units: SqliteUnitOfWorkFactory) -> Self {
        Self { units }
    }

    pub fn create_lookup_type(
        &self,
        category: &str,
        code: &str,
        label: &str,
        sort_order: i32,
    ) -> ServiceResult<LookupType> {
        let lookup = LookupType::new(
            category.trim(),
            code.trim().to_ascii_lowercase(),
            label.trim(),
        )
        .with_sort_order(sort_order);
        lookup.validate()?;

        in_unit_of_work(&self.units, |uow| {
            let lookups = uow.lookup_types()?;
            lookups.create_lookup_type(&lookup)?;
            lookups
                .get_lookup_type(lookup.id)?
                .ok_or(ServiceError::InconsistentState(
                    "created lookup type missing on read-back",
                ))
        })
    }

    /// Inserts the default link categories and languages that are missing.
    ///
    /// Returns how many rows were inserted; all inserts share one transaction.
    pub fn seed_defaults(&self) -> ServiceResult<usize> {
        let inserted = in_unit_of_work(&self.units, |uow| {
            let lookups = uow.lookup_types()?;
            let mut inserted = 0;
            for (position, (category, code, label)) in DEFAULT_LOOKUPS.iter().enumerate() {
                if lookups.find_by_code(category, code)?.is_some() {
                    continue;
                }
                let sort_order = i32::try_from(position).unwrap_or(i32::MAX);
                let lookup = LookupType::new(*category, *code, *label).with_sort_order(sort_order);
                lookups.create_lookup_type(&lookup)?;
                inserted += 1;
            }
            Ok(inserted)
        })?;
        info!("event=lookup_seed module=service status=ok inserted={inserted}");
        Ok(inserted)
    }

    pub fn resolve(&self, category: &str, code: &str) -> ServiceResult<LookupType> {
        in_unit_of_work(&self.units, |uow| resolve_lookup(uow, category, code))
    }

    pub fn list_category(
        &self,
        category: &str,
        page: PageRequest,
    ) -> ServiceResult<Page<LookupType>> {
        let query = LookupTypeQuery {
            category: Some(category.to_string()),
            page,
            ..LookupTypeQuery::default()
        };
        self.list(&query)
    }

    pub fn list(&self, query: &LookupTypeQuery) -> ServiceResult<Page<LookupType>> {
        in_unit_of_work(&self.units, |uow| {
            Ok(uow.lookup_types()?.list_lookup_types(query)?)
        })
    }

    pub fn deactivate(&self, id: LookupTypeId) -> ServiceResult<()> {
        in_unit_of_work(&self.units, |uow| {
            Ok(uow.lookup_types()?.deactivate_lookup_type(id)?)
        })
    }
}
