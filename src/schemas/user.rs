use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::User;
use crate::db::types::UserRole;
use crate::schemas::{default_true, format_primitive};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SignupRequest {
    #[validate(email(message = "email is invalid"))]
    pub(crate) email: String,
    #[serde(alias = "fullName")]
    #[validate(length(min = 1, max = 200, message = "full_name must not be empty"))]
    pub(crate) full_name: String,
    pub(crate) password: String,
    #[serde(alias = "secretKey")]
    #[validate(length(min = 1, message = "secret_key is required"))]
    pub(crate) secret_key: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    pub(crate) email: String,
    pub(crate) password: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DemoLoginRequest {
    #[serde(default, alias = "displayName")]
    pub(crate) display_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct StudentCreate {
    #[validate(email(message = "email is invalid"))]
    pub(crate) email: String,
    #[serde(alias = "fullName")]
    #[validate(length(min = 1, max = 200, message = "full_name must not be empty"))]
    pub(crate) full_name: String,
    pub(crate) password: String,
    #[serde(default = "default_true", alias = "isActive")]
    pub(crate) is_active: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct StudentUpdate {
    #[serde(default, alias = "fullName")]
    #[validate(length(min = 1, max = 200, message = "full_name must not be empty"))]
    pub(crate) full_name: Option<String>,
    #[serde(default)]
    pub(crate) password: Option<String>,
    #[serde(default, alias = "isActive")]
    pub(crate) is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) created_at: String,
}

impl UserResponse {
    pub(crate) fn from_db(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
            is_active: user.is_active,
            created_at: format_primitive(user.created_at),
        }
    }
}
