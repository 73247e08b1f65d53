//! User account use cases.

use super::{in_unit_of_work, ServiceError, ServiceResult};
use crate::bootstrap::SqliteUnitOfWorkFactory;
use crate::model::page::Page;
use crate::model::user::{User, UserId};
use crate::repo::user_repo::UserListQuery;
use crate::repo::SqliteRepositories;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterUserRequest {
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateProfileRequest {
    pub email: String,
    pub display_name: Option<String>,
}

pub struct UserService {
    units: SqliteUnitOfWorkFactory,
}

impl UserService {
    pub fn new(units: SqliteUnitOfWorkFactory) -> Self {
        Self { units }
    }

    /// Registers a new user; usernames are unique ignoring case.
    pub fn register_user(&self, request: &RegisterUserRequest) -> ServiceResult<User> {
        let mut user = User::new(request.username.trim(), request.email.trim());
        user.display_name = normalize_optional(request.display_name.as_deref());
        user.validate()?;

        in_unit_of_work(&self.units, |uow| {
            let users = uow.users()?;
            if users.find_by_username(&user.username)?.is_some() {
                return Err(ServiceError::Conflict(format!(
                    "username `{}` is already taken",
                    user.username
                )));
            }
            users.create_user(&user)?;
            users
                .get_user(user.id)?
                .ok_or(ServiceError::InconsistentState("created user missing on read-back"))
        })
    }

    pub fn get_user(&self, id: UserId) -> ServiceResult<User> {
        in_unit_of_work(&self.units, |uow| {
            uow.users()?
                .get_user(id)?
                .ok_or(ServiceError::NotFound { entity: "user", id })
        })
    }

    pub fn find_by_username(&self, username: &str) -> ServiceResult<Option<User>> {
        in_unit_of_work(&self.units, |uow| Ok(uow.users()?.find_by_username(username)?))
    }

    pub fn list_users(&self, query: &UserListQuery) -> ServiceResult<Page<User>> {
        in_unit_of_work(&self.units, |uow| Ok(uow.users()?.list_users(query)?))
    }

    pub fn update_profile(
        &self,
        id: UserId,
        request: &UpdateProfileRequest,
    ) -> ServiceResult<User> {
        in_unit_of_work(&self.units, |uow| {
            let users = uow.users()?;
            let mut user = users
                .get_user(id)?
                .ok_or(ServiceError::NotFound { entity: "user", id })?;
            user.email = request.email.trim().to_string();
            user.display_name = normalize_optional(request.display_name.as_deref());
            users.update_user(&user)?;
            users
                .get_user(id)?
                .ok_or(ServiceError::InconsistentState("updated user missing on read-back"))
        })
    }

    pub fn deactivate_user(&self, id: UserId) -> ServiceResult<()> {
        in_unit_of_work(&self.units, |uow| Ok(uow.users()?.set_active(id, false)?))
    }
}

fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
