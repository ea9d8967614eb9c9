use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::api::admin::tests::find_test;
use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::api::validation::validate_payload;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::QuestionOption;
use crate::repositories;
use crate::repositories::questions::{NewOption, QuestionWithOptions};
use crate::schemas::test::{AdminQuestionResponse, QuestionImportResponse, QuestionSave};
use crate::services::question_csv::{export_questions, parse_questions, CsvError};

/// Question routes, merged into the admin tests router.
pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/:test_id/questions", get(list_questions).post(create_question))
        .route("/:test_id/questions/import", post(import_questions))
        .route("/:test_id/questions/export", get(export_questions_csv))
        .route(
            "/:test_id/questions/:question_id",
            get(get_question).put(update_question).delete(delete_question),
        )
}

fn question_not_found() -> ApiError {
    ApiError::NotFound("Question not found".to_string())
}

async fn insert_options(
    conn: &mut PgConnection,
    question_id: &str,
    options: &[NewOption<'_>],
) -> Result<Vec<QuestionOption>, sqlx::Error> {
    let mut inserted = Vec::with_capacity(options.len());
    for (index, option) in options.iter().enumerate() {
        inserted.push(
            repositories::questions::insert_option(
                &mut *conn,
                &Uuid::new_v4().to_string(),
                question_id,
                option,
                index as i32,
            )
            .await?,
        );
    }
    Ok(inserted)
}

fn new_options(payload: &QuestionSave) -> Vec<NewOption<'_>> {
    payload
        .options
        .iter()
        .map(|option| NewOption { label: option.label.trim(), is_correct: option.is_correct })
        .collect()
}

async fn list_questions(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Path(test_id): Path<String>,
) -> Result<Json<Vec<AdminQuestionResponse>>, ApiError> {
    find_test(&state, &test_id).await?;
    let questions = repositories::questions::list_with_options(state.db(), &test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list questions"))?;
    Ok(Json(questions.into_iter().map(AdminQuestionResponse::from_db).collect()))
}

async fn get_question(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Path((test_id, question_id)): Path<(String, String)>,
) -> Result<Json<AdminQuestionResponse>, ApiError> {
    let question = repositories::questions::find_with_options(state.db(), &test_id, &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question"))?
        .ok_or_else(question_not_found)?;
    Ok(Json(AdminQuestionResponse::from_db(question)))
}

async fn create_question(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Path(test_id): Path<String>,
    Json(payload): Json<QuestionSave>,
) -> Result<(StatusCode, Json<AdminQuestionResponse>), ApiError> {
    validate_payload(&payload)?;
    find_test(&state, &test_id).await?;

    let mut tx =
        state.db().begin().await.map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let order_index = match payload.order_index {
        Some(index) => index,
        None => repositories::questions::next_order_index(&mut *tx, &test_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to compute question order"))?,
    };

    let question = repositories::questions::create(
        &mut *tx,
        repositories::questions::CreateQuestion {
            id: &Uuid::new_v4().to_string(),
            test_id: &test_id,
            text: payload.text.trim(),
            points: payload.points,
            negative_points: payload.negative_points,
            order_index,
            created_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create question"))?;

    let options = insert_options(&mut tx, &question.id, &new_options(&payload))
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create options"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to save question"))?;

    Ok((
        StatusCode::CREATED,
        Json(AdminQuestionResponse::from_db(QuestionWithOptions { question, options })),
    ))
}

/// Replaces the question text, scoring and the whole option list.
async fn update_question(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Path((test_id, question_id)): Path<(String, String)>,
    Json(payload): Json<QuestionSave>,
) -> Result<Json<AdminQuestionResponse>, ApiError> {
    validate_payload(&payload)?;
    let existing = repositories::questions::find_with_options(state.db(), &test_id, &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question"))?
        .ok_or_else(question_not_found)?;

    let mut tx =
        state.db().begin().await.map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let question = repositories::questions::update(
        &mut *tx,
        &question_id,
        payload.text.trim(),
        payload.points,
        payload.negative_points,
        payload.order_index.unwrap_or(existing.question.order_index),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update question"))?;

    repositories::questions::delete_options(&mut *tx, &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to replace options"))?;
    let options = insert_options(&mut tx, &question_id, &new_options(&payload))
        .await
        .map_err(|e| ApiError::internal(e, "Failed to replace options"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to save question"))?;

    Ok(Json(AdminQuestionResponse::from_db(QuestionWithOptions { question, options })))
}

async fn delete_question(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Path((test_id, question_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let deleted = repositories::questions::delete_by_id(state.db(), &test_id, &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete question"))?;
    if !deleted {
        return Err(question_not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Appends every CSV row as a question. Either all rows are imported or none.
async fn import_questions(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Path(test_id): Path<String>,
    body: String,
) -> Result<(StatusCode, Json<QuestionImportResponse>), ApiError> {
    find_test(&state, &test_id).await?;

    let parsed =
        parse_questions(&body).map_err(|err: CsvError| ApiError::BadRequest(err.to_string()))?;

    let mut tx =
        state.db().begin().await.map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;
    let first_index = repositories::questions::next_order_index(&mut *tx, &test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to compute question order"))?;
    let now = primitive_now_utc();

    for (offset, item) in parsed.iter().enumerate() {
        let question = repositories::questions::create(
            &mut *tx,
            repositories::questions::CreateQuestion {
                id: &Uuid::new_v4().to_string(),
                test_id: &test_id,
                text: &item.text,
                points: item.points,
                negative_points: item.negative_points,
                order_index: first_index + offset as i32,
                created_at: now,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to import question"))?;

        let options: Vec<NewOption<'_>> = item
            .options
            .iter()
            .map(|option| NewOption { label: &option.label, is_correct: option.is_correct })
            .collect();
        insert_options(&mut tx, &question.id, &options)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to import options"))?;
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to save imported questions"))?;

    tracing::info!(
        admin_id = %admin.id,
        test_id = %test_id,
        imported = parsed.len(),
        action = "question_import",
        "Admin imported questions"
    );

    Ok((StatusCode::CREATED, Json(QuestionImportResponse { imported: parsed.len() })))
}

async fn export_questions_csv(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Path(test_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    find_test(&state, &test_id).await?;
    let questions = repositories::questions::list_with_options(state.db(), &test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list questions"))?;

    let body = export_questions(&questions)
        .map_err(|e| ApiError::internal(e, "Failed to write questions CSV"))?;
    let disposition = format!("attachment; filename=\"questions-{test_id}.csv\"");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

#[cfg(test)]
mod tests;
