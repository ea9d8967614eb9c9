use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::api::validation::validate_payload;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::format_primitive;
use crate::schemas::secret_key::{
    GeneratedSecretKeyResponse, SecretKeyGenerate, SecretKeyListQuery, SecretKeyResponse,
};
use crate::services::secret_keys::{generate_secret_key, hash_secret_key};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_keys).post(generate_keys))
        .route("/:key_id/revoke", post(revoke_key))
}

async fn list_keys(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Query(params): Query<SecretKeyListQuery>,
) -> Result<Json<Vec<SecretKeyResponse>>, ApiError> {
    let keys = repositories::secret_keys::list(state.db(), params.include_redeemed)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list secret keys"))?;
    Ok(Json(keys.into_iter().map(SecretKeyResponse::from_db).collect()))
}

/// Plain keys are returned only here. The database keeps their hashes.
async fn generate_keys(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<SecretKeyGenerate>,
) -> Result<(StatusCode, Json<Vec<GeneratedSecretKeyResponse>>), ApiError> {
    validate_payload(&payload)?;
    let now = primitive_now_utc();
    if payload.expires_at.is_some_and(|expires_at| expires_at <= now) {
        return Err(ApiError::BadRequest("expires_at must be in the future".to_string()));
    }
    let label = payload.label.as_deref().map(str::trim).filter(|label| !label.is_empty());

    let mut generated = Vec::with_capacity(payload.count as usize);
    for _ in 0..payload.count {
        let key = generate_secret_key();
        let stored = repositories::secret_keys::create(
            state.db(),
            repositories::secret_keys::CreateSecretKey {
                id: &Uuid::new_v4().to_string(),
                key_hash: &hash_secret_key(&key),
                label,
                created_by: &admin.id,
                expires_at: payload.expires_at,
                created_at: now,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to store secret key"))?;

        generated.push(GeneratedSecretKeyResponse {
            id: stored.id,
            key,
            label: stored.label,
            expires_at: stored.expires_at.map(format_primitive),
        });
    }

    tracing::info!(
        admin_id = %admin.id,
        count = generated.len(),
        action = "secret_key_generate",
        "Admin generated secret keys"
    );
    Ok((StatusCode::CREATED, Json(generated)))
}

async fn revoke_key(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Path(key_id): Path<String>,
) -> Result<Json<SecretKeyResponse>, ApiError> {
    let key = repositories::secret_keys::revoke(state.db(), &key_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to revoke secret key"))?
        .ok_or_else(|| ApiError::NotFound("Secret key not found".to_string()))?;

    tracing::info!(admin_id = %admin.id, key_id = %key.id, action = "secret_key_revoke", "Secret key revoked");
    Ok(Json(SecretKeyResponse::from_db(key)))
}
