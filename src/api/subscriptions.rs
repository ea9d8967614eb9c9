use axum::{extract::State, routing::get, Json, Router};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::subscription::SubscriptionResponse;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/me", get(my_subscriptions))
}

/// Subscriptions that are active and not yet expired.
async fn my_subscriptions(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<SubscriptionResponse>>, ApiError> {
    let subscriptions =
        repositories::subscriptions::list_current_for_user(state.db(), &user.id, primitive_now_utc())
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list subscriptions"))?;

    Ok(Json(subscriptions.into_iter().map(SubscriptionResponse::from_db).collect()))
}
