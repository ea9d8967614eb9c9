use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::Principal;
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::stats::{
    LeaderboardEntryResponse, LeaderboardQuery, LeaderboardResponse, PlaceholderEntryResponse,
};
use crate::services::leaderboard;

const MAX_LEADERBOARD_LIMIT: usize = 200;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/", get(get_leaderboard))
}

async fn get_leaderboard(
    _principal: Principal,
    State(state): State<AppState>,
    Query(params): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    let test_id = params.test_id.filter(|value| !value.trim().is_empty());
    let rows = repositories::stats::scored_attempts_for_leaderboard(state.db(), test_id.as_deref())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load leaderboard"))?;

    let entries = leaderboard::rank_entries(rows, params.limit.clamp(1, MAX_LEADERBOARD_LIMIT))
        .into_iter()
        .map(LeaderboardEntryResponse::from)
        .collect();

    let placeholders = state.settings().exam().leaderboard_placeholders.then(|| {
        leaderboard::placeholder_entries().into_iter().map(PlaceholderEntryResponse::from).collect()
    });

    Ok(Json(LeaderboardResponse { test_id, entries, placeholders }))
}
