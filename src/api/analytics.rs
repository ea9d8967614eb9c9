use axum::{extract::State, routing::get, Json, Router};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::stats::StudentAnalyticsResponse;
use crate::services::analytics;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/me", get(my_analytics))
}

async fn my_analytics(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<StudentAnalyticsResponse>, ApiError> {
    let rows = repositories::stats::scored_attempts_for_user(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load attempts"))?;

    Ok(Json(analytics::summarize(&rows).into()))
}
