use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::api::validation::validate_payload;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::repositories::subscriptions::SaveSubscription;
use crate::schemas::subscription::{
    SubscriptionListQuery, SubscriptionResponse, SubscriptionSave,
};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_subscriptions).post(create_subscription))
        .route("/:subscription_id", put(update_subscription).delete(delete_subscription))
}

fn subscription_not_found() -> ApiError {
    ApiError::NotFound("Subscription not found".to_string())
}

async fn checked_params<'a>(
    state: &AppState,
    payload: &'a SubscriptionSave,
) -> Result<SaveSubscription<'a>, ApiError> {
    validate_payload(payload)?;
    if payload.expires_at.is_some_and(|expires_at| expires_at <= payload.starts_at) {
        return Err(ApiError::BadRequest("expires_at must be after starts_at".to_string()));
    }
    let user = repositories::users::find_by_id(state.db(), &payload.user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch user"))?;
    if user.is_none() {
        return Err(ApiError::BadRequest("User not found".to_string()));
    }

    Ok(SaveSubscription {
        user_id: &payload.user_id,
        plan: payload.plan.trim(),
        starts_at: payload.starts_at,
        expires_at: payload.expires_at,
        is_active: payload.is_active,
    })
}

async fn list_subscriptions(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Query(params): Query<SubscriptionListQuery>,
) -> Result<Json<Vec<SubscriptionResponse>>, ApiError> {
    let subscriptions = repositories::subscriptions::list(state.db(), params.user_id.as_deref())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list subscriptions"))?;
    Ok(Json(subscriptions.into_iter().map(SubscriptionResponse::from_db).collect()))
}

async fn create_subscription(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<SubscriptionSave>,
) -> Result<(StatusCode, Json<SubscriptionResponse>), ApiError> {
    let params = checked_params(&state, &payload).await?;
    let subscription = repositories::subscriptions::create(
        state.db(),
        &Uuid::new_v4().to_string(),
        params,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create subscription"))?;

    tracing::info!(
        admin_id = %admin.id,
        user_id = %subscription.user_id,
        plan = %subscription.plan,
        action = "subscription_create",
        "Subscription created"
    );
    Ok((StatusCode::CREATED, Json(SubscriptionResponse::from_db(subscription))))
}

async fn update_subscription(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
    Json(payload): Json<SubscriptionSave>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let params = checked_params(&state, &payload).await?;
    let subscription = repositories::subscriptions::replace(
        state.db(),
        &subscription_id,
        params,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update subscription"))?
    .ok_or_else(subscription_not_found)?;
    Ok(Json(SubscriptionResponse::from_db(subscription)))
}

async fn delete_subscription(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deleted = repositories::subscriptions::delete_by_id(state.db(), &subscription_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete subscription"))?;
    if !deleted {
        return Err(subscription_not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}
