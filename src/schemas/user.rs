use serde::{Deserialize, Serialize};
use validator::{Validate, ValidateEmail, ValidationError};

use crate::core::time::format_primitive;
use crate::db::models::User;
use crate::services::users::UserChanges;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct UserCreate {
    #[validate(length(min = 1, max = 64, message = "login must be 1 to 64 characters"))]
    pub(crate) login: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters long"))]
    pub(crate) password: String,
    #[serde(default)]
    #[serde(alias = "fullName")]
    pub(crate) full_name: String,
    #[serde(default)]
    #[validate(email(message = "email is not valid"))]
    pub(crate) email: Option<String>,
    #[serde(default)]
    #[serde(alias = "isAdmin")]
    pub(crate) is_admin: bool,
}

/// Partial admin edit. An empty `email` removes the address.
#[derive(Debug, Default, Deserialize, Validate)]
pub(crate) struct UserUpdate {
    #[serde(default)]
    #[validate(length(min = 1, max = 64, message = "login must be 1 to 64 characters"))]
    pub(crate) login: Option<String>,
    #[serde(default)]
    #[serde(alias = "fullName")]
    pub(crate) full_name: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "email_or_empty"))]
    pub(crate) email: Option<String>,
    #[serde(default)]
    #[validate(length(min = 8, message = "password must be at least 8 characters long"))]
    pub(crate) password: Option<String>,
}

fn email_or_empty(email: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() || email.trim().validate_email() {
        Ok(())
    } else {
        Err(ValidationError::new("email").with_message("email is not valid".into()))
    }
}

impl UserUpdate {
    pub(crate) fn into_changes(self) -> UserChanges {
        UserChanges {
            login: self.login,
            full_name: self.full_name,
            email: self.email,
            password: self.password,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserActiveUpdate {
    #[serde(alias = "isActive")]
    pub(crate) is_active: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    pub(crate) id: String,
    pub(crate) login: String,
    pub(crate) email: Option<String>,
    pub(crate) full_name: String,
    pub(crate) is_admin: bool,
    pub(crate) is_active: bool,
    pub(crate) created_at: String,
}

impl UserResponse {
    pub(crate) fn from_db(user: User) -> Self {
        Self {
            id: user.id,
            login: user.login,
            email: user.email,
            full_name: user.full_name,
            is_admin: user.is_admin,
            is_active: user.is_active,
            created_at: format_primitive(user.created_at),
        }
    }
}

/// What other course members get to see about a person.
#[derive(Debug, Serialize)]
pub(crate) struct UserSummary {
    pub(crate) id: String,
    pub(crate) login: String,
    pub(crate) full_name: String,
}

impl UserSummary {
    pub(crate) fn from_db(user: User) -> Self {
        Self { id: user.id, login: user.login, full_name: user.full_name }
    }

    pub(crate) fn list(users: Vec<User>) -> Vec<Self> {
        users.into_iter().map(Self::from_db).collect()
    }
}
