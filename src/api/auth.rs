use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::Principal;
use crate::api::validation::{validate_password_len, validate_payload};
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::auth::{PrincipalResponse, TokenResponse};
use crate::schemas::user::{DemoLoginRequest, LoginRequest, SignupRequest};
use crate::services::secret_keys::hash_secret_key;

/// Max attempts per window for auth endpoints (login/signup/demo).
const AUTH_RATE_LIMIT: u64 = 10;
/// Rate limit window in seconds.
const AUTH_RATE_WINDOW_SECONDS: u64 = 60;
const DEMO_NAME_MAX_LEN: usize = 60;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/demo", post(demo))
        .route("/me", get(me))
}

async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    validate_payload(&payload)?;
    validate_password_len(&payload.password)?;

    let email = payload.email.trim().to_lowercase();
    let rate_key = format!("rl:signup:{email}");
    if !state.redis().allow(&rate_key, AUTH_RATE_LIMIT, AUTH_RATE_WINDOW_SECONDS).await {
        return Err(ApiError::TooManyRequests("Too many signup attempts, try again later"));
    }

    let hashed_password = security::hash_password(&payload.password)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;
    let now = primitive_now_utc();
    let user_id = Uuid::new_v4().to_string();

    let mut tx =
        state.db().begin().await.map_err(|e| ApiError::internal(e, "Failed to start signup"))?;

    let existing = repositories::users::find_by_email(&mut *tx, &email)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check existing user"))?;
    if existing.is_some() {
        return Err(ApiError::Conflict("User with this email already exists".to_string()));
    }

    let user = repositories::users::create(
        &mut *tx,
        repositories::users::CreateUser {
            id: &user_id,
            email: &email,
            hashed_password,
            full_name: payload.full_name.trim(),
            role: UserRole::Student,
            is_active: true,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create user"))?;

    let redeemed = repositories::secret_keys::redeem(
        &mut *tx,
        &hash_secret_key(&payload.secret_key),
        &user.id,
        now,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to redeem secret key"))?;
    if !redeemed {
        return Err(ApiError::BadRequest("Secret key is invalid or already used".to_string()));
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to complete signup"))?;
    tracing::info!(user_id = %user.id, "Student signed up");

    let token = security::create_access_token(&user.id, state.settings(), None)
        .map_err(|e| ApiError::internal(e, "Failed to create access token"))?;

    Ok((StatusCode::CREATED, Json(TokenResponse::bearer(token, &Principal::User(user)))))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let email = payload.email.trim().to_lowercase();

    let rate_key = format!("rl:login:{email}");
    if !state.redis().allow(&rate_key, AUTH_RATE_LIMIT, AUTH_RATE_WINDOW_SECONDS).await {
        return Err(ApiError::TooManyRequests("Too many login attempts, try again later"));
    }

    let user = repositories::users::find_by_email(state.db(), &email)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?
        .ok_or(ApiError::Unauthorized("Incorrect email or password"))?;

    let verified = security::verify_password(&payload.password, &user.hashed_password)
        .map_err(|_| ApiError::Unauthorized("Incorrect email or password"))?;

    if !verified {
        return Err(ApiError::Unauthorized("Incorrect email or password"));
    }

    if !user.is_active {
        return Err(ApiError::BadRequest("Inactive user".to_string()));
    }

    let token = security::create_access_token(&user.id, state.settings(), None)
        .map_err(|e| ApiError::internal(e, "Failed to create access token"))?;

    Ok(Json(TokenResponse::bearer(token, &Principal::User(user))))
}

/// Issues a token for a throwaway identity. Nothing is stored.
async fn demo(
    State(state): State<AppState>,
    payload: Option<Json<DemoLoginRequest>>,
) -> Result<Json<TokenResponse>, ApiError> {
    if !state.settings().exam().demo_enabled {
        return Err(ApiError::NotFound("Demo access is disabled".to_string()));
    }

    let Json(payload) = payload.unwrap_or_default();
    let display_name = payload
        .display_name
        .map(|name| name.trim().chars().take(DEMO_NAME_MAX_LEN).collect::<String>())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "Demo student".to_string());

    let demo_id = format!("demo-user-{}", Uuid::new_v4());
    let token = security::create_demo_token(&demo_id, &display_name, state.settings())
        .map_err(|e| ApiError::internal(e, "Failed to create demo token"))?;

    tracing::info!(demo_id = %demo_id, "Demo identity issued");
    Ok(Json(TokenResponse::bearer(token, &Principal::Demo { demo_id, display_name })))
}

async fn me(principal: Principal) -> Json<PrincipalResponse> {
    Json(PrincipalResponse::from_principal(&principal))
}
