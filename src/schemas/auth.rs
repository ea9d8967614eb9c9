use serde::Serialize;

use crate::api::guards::Principal;
use crate::db::types::UserRole;

/// Whoever holds the token: a stored user or a demo identity.
#[derive(Debug, Serialize)]
pub(crate) struct PrincipalResponse {
    pub(crate) id: String,
    pub(crate) email: Option<String>,
    pub(crate) full_name: String,
    pub(crate) role: Option<UserRole>,
    pub(crate) is_demo: bool,
}

impl PrincipalResponse {
    pub(crate) fn from_principal(principal: &Principal) -> Self {
        match principal {
            Principal::User(user) => Self {
                id: user.id.clone(),
                email: Some(user.email.clone()),
                full_name: user.full_name.clone(),
                role: Some(user.role),
                is_demo: false,
            },
            Principal::Demo { demo_id, display_name } => Self {
                id: demo_id.clone(),
                email: None,
                full_name: display_name.clone(),
                role: None,
                is_demo: true,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    pub(crate) token_type: String,
    pub(crate) user: PrincipalResponse,
}

impl TokenResponse {
    pub(crate) fn bearer(access_token: String, principal: &Principal) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
            user: PrincipalResponse::from_principal(principal),
        }
    }
}
