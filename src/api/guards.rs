use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::{security, state::AppState};
use crate::db::models::User;
use crate::db::types::UserRole;
use crate::repositories;
use crate::services::session::SessionIdentity;

/// The caller behind a bearer token. Demo identities exist only inside their token.
#[derive(Debug, Clone)]
pub(crate) enum Principal {
    User(User),
    Demo { demo_id: String, display_name: String },
}

impl Principal {
    pub(crate) fn session_identity(&self) -> SessionIdentity {
        match self {
            Principal::User(user) => SessionIdentity::Student { user_id: user.id.clone() },
            Principal::Demo { demo_id, .. } => SessionIdentity::Demo { demo_id: demo_id.clone() },
        }
    }

    pub(crate) fn display_name(&self) -> &str {
        match self {
            Principal::User(user) => &user.full_name,
            Principal::Demo { display_name, .. } => display_name,
        }
    }
}

pub(crate) struct CurrentUser(pub(crate) User);
pub(crate) struct CurrentAdmin(pub(crate) User);

#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(app_state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let claims = security::verify_token(token, app_state.settings())
            .map_err(|_| ApiError::Unauthorized("Invalid authentication credentials"))?;

        if claims.demo {
            if !app_state.settings().exam().demo_enabled {
                return Err(ApiError::Unauthorized("Demo access is disabled"));
            }
            return Ok(Principal::Demo {
                demo_id: claims.sub,
                display_name: claims.name.unwrap_or_else(|| "Demo student".to_string()),
            });
        }

        let user = repositories::users::find_by_id(app_state.db(), &claims.sub)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load user"))?;

        let Some(user) = user else {
            return Err(ApiError::Unauthorized("User not found"));
        };

        if !user.is_active {
            return Err(ApiError::Unauthorized("Invalid authentication credentials"));
        }

        Ok(Principal::User(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match Principal::from_request_parts(parts, state).await? {
            Principal::User(user) => Ok(CurrentUser(user)),
            Principal::Demo { .. } => Err(ApiError::Forbidden("Not available in demo mode")),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;

        if user.role == UserRole::Admin {
            Ok(CurrentAdmin(user))
        } else {
            Err(ApiError::Forbidden("Admin access required"))
        }
    }
}
