use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::errors::ApiError;
use crate::api::guards::Principal;
use crate::api::pagination::PaginatedResponse;
use crate::api::sessions;
use crate::core::state::AppState;
use crate::db::types::TestStatus;
use crate::repositories;
use crate::schemas::test::TestSummaryResponse;

const LISTED_STATUSES: [TestStatus; 2] = [TestStatus::Published, TestStatus::ComingSoon];

#[derive(Debug, Deserialize)]
struct CatalogQuery {
    #[serde(default)]
    skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    limit: i64,
    #[serde(default, alias = "categoryId")]
    category_id: Option<String>,
    #[serde(default)]
    search: Option<String>,
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tests))
        .route("/:test_id", get(get_test))
        .route("/:test_id/sessions", post(sessions::open_session))
}

async fn list_tests(
    _principal: Principal,
    State(state): State<AppState>,
    Query(params): Query<CatalogQuery>,
) -> Result<Json<PaginatedResponse<TestSummaryResponse>>, ApiError> {
    let skip = params.skip.max(0);
    let limit = params.limit.clamp(1, 1000);
    let search = params.search.as_deref().map(str::trim).filter(|value| !value.is_empty());

    let filters = repositories::tests::ListTests {
        statuses: &LISTED_STATUSES,
        category_id: params.category_id.as_deref(),
        search,
        skip,
        limit,
    };

    let tests = repositories::tests::list(state.db(), filters)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list tests"))?;
    let total_count = repositories::tests::count(state.db(), filters)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count tests"))?;

    let test_ids: Vec<String> = tests.iter().map(|test| test.id.clone()).collect();
    let counts = repositories::tests::count_questions_by_tests(state.db(), &test_ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count questions"))?;

    let items = tests
        .into_iter()
        .map(|test| {
            let question_count = counts.get(&test.id).copied().unwrap_or(0);
            TestSummaryResponse::from_db(test, question_count)
        })
        .collect();

    Ok(Json(PaginatedResponse { items, total_count, skip, limit }))
}

/// Only published tests can be opened. Questions are served by the session, never here.
async fn get_test(
    _principal: Principal,
    State(state): State<AppState>,
    Path(test_id): Path<String>,
) -> Result<Json<TestSummaryResponse>, ApiError> {
    let test = repositories::tests::find_by_id(state.db(), &test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch test"))?
        .filter(|test| test.status == TestStatus::Published)
        .ok_or_else(|| ApiError::NotFound("Test not found".to_string()))?;

    let question_count = repositories::tests::count_questions(state.db(), &test.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count questions"))?;

    Ok(Json(TestSummaryResponse::from_db(test, question_count)))
}
