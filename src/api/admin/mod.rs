mod categories;
mod materials;
mod questions;
mod secret_keys;
mod students;
mod subscriptions;
mod tests;

use axum::{extract::State, routing::get, Json, Router};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::stats::PlatformAnalyticsResponse;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .nest("/categories", categories::router())
        .nest("/tests", tests::router())
        .nest("/students", students::router())
        .nest("/secret-keys", secret_keys::router())
        .nest("/subscriptions", subscriptions::router())
        .nest("/materials", materials::router())
        .route("/analytics", get(platform_analytics))
}

async fn platform_analytics(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<PlatformAnalyticsResponse>, ApiError> {
    let counts = repositories::stats::platform_counts(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load platform counts"))?;
    let rows = repositories::stats::test_stats(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load test statistics"))?;
    let live_sessions = state.sessions().live_count().await;

    Ok(Json(PlatformAnalyticsResponse::new(counts, live_sessions, rows)))
}
