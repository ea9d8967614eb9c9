use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::admin::questions;
use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::api::pagination::PaginatedResponse;
use crate::api::validation::validate_payload;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::Test;
use crate::db::types::TestStatus;
use crate::repositories;
use crate::schemas::test::{AdminTestResponse, TestCreate, TestStatusUpdate, TestUpdate};

#[derive(Debug, Deserialize)]
struct AdminTestQuery {
    #[serde(default)]
    skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    limit: i64,
    #[serde(default)]
    status: Option<TestStatus>,
    #[serde(default, alias = "categoryId")]
    category_id: Option<String>,
    #[serde(default)]
    search: Option<String>,
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tests).post(create_test))
        .route("/:test_id", get(get_test).patch(update_test).delete(delete_test))
        .route("/:test_id/status", patch(update_status))
        .merge(questions::routes())
}

pub(super) async fn find_test(state: &AppState, test_id: &str) -> Result<Test, ApiError> {
    repositories::tests::find_by_id(state.db(), test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch test"))?
        .ok_or_else(|| ApiError::NotFound("Test not found".to_string()))
}

pub(super) async fn ensure_category(state: &AppState, category_id: Option<&str>) -> Result<(), ApiError> {
    let Some(category_id) = category_id else {
        return Ok(());
    };
    let category = repositories::categories::find_by_id(state.db(), category_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch category"))?;
    if category.is_none() {
        return Err(ApiError::BadRequest("Category not found".to_string()));
    }
    Ok(())
}

async fn with_count(state: &AppState, test: Test) -> Result<AdminTestResponse, ApiError> {
    let question_count = repositories::tests::count_questions(state.db(), &test.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count questions"))?;
    Ok(AdminTestResponse::from_db(test, question_count))
}

async fn list_tests(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Query(params): Query<AdminTestQuery>,
) -> Result<Json<PaginatedResponse<AdminTestResponse>>, ApiError> {
    let skip = params.skip.max(0);
    let limit = params.limit.clamp(1, 1000);
    let statuses: Vec<TestStatus> = params.status.into_iter().collect();
    let filters = repositories::tests::ListTests {
        statuses: &statuses,
        category_id: params.category_id.as_deref(),
        search: params.search.as_deref().map(str::trim).filter(|value| !value.is_empty()),
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
            AdminTestResponse::from_db(test, question_count)
        })
        .collect();

    Ok(Json(PaginatedResponse { items, total_count, skip, limit }))
}

async fn get_test(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Path(test_id): Path<String>,
) -> Result<Json<AdminTestResponse>, ApiError> {
    let test = find_test(&state, &test_id).await?;
    Ok(Json(with_count(&state, test).await?))
}

async fn create_test(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<TestCreate>,
) -> Result<(StatusCode, Json<AdminTestResponse>), ApiError> {
    validate_payload(&payload)?;
    ensure_category(&state, payload.category_id.as_deref()).await?;

    let test = repositories::tests::create(
        state.db(),
        repositories::tests::CreateTest {
            id: &Uuid::new_v4().to_string(),
            title: payload.title.trim(),
            description: payload.description.as_deref(),
            category_id: payload.category_id.as_deref(),
            duration_minutes: payload.duration_minutes,
            status: payload.status,
            shuffle_questions: payload.shuffle_questions,
            shuffle_options: payload.shuffle_options,
            negative_marking: payload.negative_marking,
            created_by: &admin.id,
            now: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create test"))?;

    tracing::info!(
        admin_id = %admin.id,
        test_id = %test.id,
        status = ?test.status,
        action = "test_create",
        "Admin created test"
    );

    Ok((StatusCode::CREATED, Json(AdminTestResponse::from_db(test, 0))))
}

async fn update_test(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Path(test_id): Path<String>,
    Json(payload): Json<TestUpdate>,
) -> Result<Json<AdminTestResponse>, ApiError> {
    validate_payload(&payload)?;
    ensure_category(&state, payload.category_id.as_deref()).await?;

    let test = repositories::tests::update(
        state.db(),
        &test_id,
        repositories::tests::UpdateTest {
            title: payload.title.map(|title| title.trim().to_string()),
            description: payload.description,
            category_id: payload.category_id,
            duration_minutes: payload.duration_minutes,
            shuffle_questions: payload.shuffle_questions,
            shuffle_options: payload.shuffle_options,
            negative_marking: payload.negative_marking,
        },
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update test"))?
    .ok_or_else(|| ApiError::NotFound("Test not found".to_string()))?;

    Ok(Json(with_count(&state, test).await?))
}

async fn update_status(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Path(test_id): Path<String>,
    Json(payload): Json<TestStatusUpdate>,
) -> Result<Json<AdminTestResponse>, ApiError> {
    if payload.status == TestStatus::Published {
        let question_count = repositories::tests::count_questions(state.db(), &test_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to count questions"))?;
        if question_count == 0 {
            find_test(&state, &test_id).await?;
            return Err(ApiError::BadRequest("Cannot publish a test without questions".to_string()));
        }
    }

    let test = repositories::tests::set_status(state.db(), &test_id, payload.status, primitive_now_utc())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update test status"))?
        .ok_or_else(|| ApiError::NotFound("Test not found".to_string()))?;

    tracing::info!(
        admin_id = %admin.id,
        test_id = %test.id,
        status = ?test.status,
        action = "test_status",
        "Admin changed test status"
    );

    Ok(Json(with_count(&state, test).await?))
}

/// Removes the test with its questions, attempts and answers.
async fn delete_test(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Path(test_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deleted = repositories::tests::delete_by_id(state.db(), &test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete test"))?;
    if !deleted {
        return Err(ApiError::NotFound("Test not found".to_string()));
    }

    tracing::info!(admin_id = %admin.id, test_id = %test_id, action = "test_delete", "Admin deleted test");
    Ok(StatusCode::NO_CONTENT)
}
