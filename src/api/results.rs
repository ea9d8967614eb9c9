use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::Principal;
use crate::api::pagination::{PageQuery, PaginatedResponse};
use crate::core::state::AppState;
use crate::db::types::{AttemptStatus, UserRole};
use crate::repositories;
use crate::schemas::result::{ResultDetailResponse, ResultSummaryResponse};
use crate::services::report::render_report;
use crate::services::results::{build_sheet, ResultSheet, SheetHeader, StoredAnswer};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_results))
        .route("/:attempt_id", get(get_result))
        .route("/:attempt_id/report", get(get_report))
}

struct LoadedResult {
    sheet: ResultSheet,
    student_name: String,
    is_demo: bool,
}

fn result_not_found() -> ApiError {
    ApiError::NotFound("Result not found".to_string())
}

async fn list_results(
    principal: Principal,
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<Json<PaginatedResponse<ResultSummaryResponse>>, ApiError> {
    let (skip, limit) = (page.skip(), page.limit());

    match principal {
        Principal::Demo { demo_id, .. } => {
            let results = state.demo_vault().list(&demo_id).await;
            let total_count = results.len() as i64;
            let items = results
                .into_iter()
                .skip(skip as usize)
                .take(limit as usize)
                .map(|result| {
                    ResultSummaryResponse::new(
                        result.attempt_id,
                        result.test.id,
                        result.test.title,
                        Some(result.submitted_at),
                        result.total_score,
                        result.max_score,
                        true,
                    )
                })
                .collect();
            Ok(Json(PaginatedResponse { items, total_count, skip, limit }))
        }
        Principal::User(user) => {
            let rows =
                repositories::attempts::list_submitted_by_user(state.db(), &user.id, skip, limit)
                    .await
                    .map_err(|e| ApiError::internal(e, "Failed to list results"))?;
            let total_count = repositories::attempts::count_submitted_by_user(state.db(), &user.id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to count results"))?;

            let items = rows
                .into_iter()
                .map(|row| {
                    ResultSummaryResponse::new(
                        row.id,
                        row.test_id,
                        row.test_title,
                        row.submitted_at,
                        row.total_score.unwrap_or(0.0),
                        row.max_score.unwrap_or(0.0),
                        false,
                    )
                })
                .collect();
            Ok(Json(PaginatedResponse { items, total_count, skip, limit }))
        }
    }
}

async fn get_result(
    principal: Principal,
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
) -> Result<Json<ResultDetailResponse>, ApiError> {
    let loaded = load_result(&state, &principal, &attempt_id).await?;
    Ok(Json(ResultDetailResponse::from_sheet(
        loaded.sheet,
        loaded.is_demo,
        &state.settings().api().api_v1_str,
    )))
}

async fn get_report(
    principal: Principal,
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let loaded = load_result(&state, &principal, &attempt_id).await?;
    let html =
        render_report(&loaded.sheet, &loaded.student_name, &state.settings().api().project_name);
    let disposition = format!("inline; filename=\"report-{attempt_id}.html\"");
    Ok(([(header::CONTENT_DISPOSITION, disposition)], Html(html)))
}

/// Demo results come from the vault; stored attempts are rebuilt from their answer rows.
/// Admins may read any stored attempt.
async fn load_result(
    state: &AppState,
    principal: &Principal,
    attempt_id: &str,
) -> Result<LoadedResult, ApiError> {
    let pass_percentage = state.settings().exam().pass_percentage;

    let user = match principal {
        Principal::Demo { demo_id, display_name } => {
            let result =
                state.demo_vault().get(demo_id, attempt_id).await.ok_or_else(result_not_found)?;
            let sheet = build_sheet(
                SheetHeader {
                    attempt_id: &result.attempt_id,
                    test_id: &result.test.id,
                    test_title: &result.test.title,
                    submitted_at: result.submitted_at,
                    total_score: result.total_score,
                    max_score: result.max_score,
                    time_remaining_seconds: result.time_remaining_seconds,
                },
                &result.questions,
                result.answers.into_iter().map(StoredAnswer::from).collect(),
                pass_percentage,
            );
            return Ok(LoadedResult { sheet, student_name: display_name.clone(), is_demo: true });
        }
        Principal::User(user) => user,
    };

    let attempt = repositories::attempts::find_by_id(state.db(), attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?
        .filter(|attempt| attempt.user_id == user.id || user.role == UserRole::Admin)
        .ok_or_else(result_not_found)?;

    if attempt.status != AttemptStatus::Submitted {
        return Err(ApiError::Conflict("Attempt is still in progress".to_string()));
    }

    let test = repositories::tests::find_by_id(state.db(), &attempt.test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch test"))?
        .ok_or_else(|| ApiError::NotFound("Test not found".to_string()))?;
    let questions = repositories::questions::list_with_options(state.db(), &test.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;
    let answers = repositories::answers::list_by_attempt(state.db(), &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch answers"))?;

    let student_name = if attempt.user_id == user.id {
        user.full_name.clone()
    } else {
        repositories::users::find_by_id(state.db(), &attempt.user_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch student"))?
            .map(|student| student.full_name)
            .unwrap_or_default()
    };

    let sheet = build_sheet(
        SheetHeader {
            attempt_id: &attempt.id,
            test_id: &test.id,
            test_title: &test.title,
            submitted_at: attempt.submitted_at.unwrap_or(attempt.updated_at),
            total_score: attempt.total_score.unwrap_or(0.0),
            max_score: attempt.max_score.unwrap_or(0.0),
            time_remaining_seconds: u32::try_from(attempt.time_remaining_seconds).unwrap_or(0),
        },
        &questions,
        answers.into_iter().map(StoredAnswer::from).collect(),
        pass_percentage,
    );

    Ok(LoadedResult { sheet, student_name, is_demo: false })
}
