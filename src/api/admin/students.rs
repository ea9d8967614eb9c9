use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::api::pagination::PaginatedResponse;
use crate::api::validation::{validate_password_len, validate_payload};
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::models::User;
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::user::{StudentCreate, StudentUpdate, UserResponse};

const EXPORT_PAGE_SIZE: i64 = 1000;

#[derive(Debug, Deserialize)]
struct StudentListQuery {
    #[serde(default)]
    skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    limit: i64,
    #[serde(default)]
    search: Option<String>,
    #[serde(default, alias = "isActive")]
    is_active: Option<bool>,
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_students).post(create_student))
        .route("/export", get(export_students))
        .route("/:user_id", get(get_student).patch(update_student).delete(delete_student))
}

async fn list_students(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Query(params): Query<StudentListQuery>,
) -> Result<Json<PaginatedResponse<UserResponse>>, ApiError> {
    let skip = params.skip.max(0);
    let limit = params.limit.clamp(1, 1000);
    let filters = repositories::users::ListUsers {
        role: Some(UserRole::Student),
        search: params.search.as_deref().map(str::trim).filter(|value| !value.is_empty()),
        is_active: params.is_active,
        skip,
        limit,
    };

    let users = repositories::users::list(state.db(), filters)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list students"))?;
    let total_count = repositories::users::count(state.db(), filters)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count students"))?;

    Ok(Json(PaginatedResponse {
        items: users.into_iter().map(UserResponse::from_db).collect(),
        total_count,
        skip,
        limit,
    }))
}

async fn find_student(state: &AppState, user_id: &str) -> Result<User, ApiError> {
    repositories::users::find_by_id(state.db(), user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch student"))?
        .filter(|user| user.role == UserRole::Student)
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))
}

async fn get_student(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    Ok(Json(UserResponse::from_db(find_student(&state, &user_id).await?)))
}

async fn create_student(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<StudentCreate>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    validate_payload(&payload)?;
    validate_password_len(&payload.password)?;

    let email = payload.email.trim().to_lowercase();
    let existing = repositories::users::find_by_email(state.db(), &email)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check existing user"))?;
    if existing.is_some() {
        return Err(ApiError::Conflict("User with this email already exists".to_string()));
    }

    let hashed_password = security::hash_password(&payload.password)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;
    let now = primitive_now_utc();

    let user = repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            email: &email,
            hashed_password,
            full_name: payload.full_name.trim(),
            role: UserRole::Student,
            is_active: payload.is_active,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create student"))?;

    tracing::info!(
        admin_id = %admin.id,
        user_id = %user.id,
        action = "student_create",
        "Admin created student"
    );

    Ok((StatusCode::CREATED, Json(UserResponse::from_db(user))))
}

async fn update_student(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<StudentUpdate>,
) -> Result<Json<UserResponse>, ApiError> {
    validate_payload(&payload)?;
    find_student(&state, &user_id).await?;

    let hashed_password = match payload.password.as_deref() {
        Some(password) => {
            validate_password_len(password)?;
            Some(
                security::hash_password(password)
                    .map_err(|e| ApiError::internal(e, "Failed to hash password"))?,
            )
        }
        None => None,
    };

    let updated = repositories::users::update(
        state.db(),
        &user_id,
        repositories::users::UpdateUser {
            full_name: payload.full_name.map(|name| name.trim().to_string()),
            role: None,
            is_active: payload.is_active,
            hashed_password,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update student"))?
    .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;

    tracing::info!(
        admin_id = %admin.id,
        user_id = %updated.id,
        action = "student_update",
        "Admin updated student"
    );

    Ok(Json(UserResponse::from_db(updated)))
}

async fn delete_student(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    find_student(&state, &user_id).await?;

    repositories::users::delete_by_id(state.db(), &user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete student"))?;

    tracing::info!(
        admin_id = %admin.id,
        user_id = %user_id,
        action = "student_delete",
        "Admin deleted student"
    );

    Ok(StatusCode::NO_CONTENT)
}

async fn export_students(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let mut students = Vec::new();
    let mut skip = 0;
    loop {
        let page = repositories::users::list(
            state.db(),
            repositories::users::ListUsers {
                role: Some(UserRole::Student),
                search: None,
                is_active: None,
                skip,
                limit: EXPORT_PAGE_SIZE,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list students"))?;
        let fetched = page.len() as i64;
        students.extend(page);
        if fetched < EXPORT_PAGE_SIZE {
            break;
        }
        skip += fetched;
    }

    let body =
        students_csv(&students).map_err(|e| ApiError::internal(e, "Failed to write students CSV"))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"students.csv\""),
        ],
        body,
    ))
}

fn students_csv(students: &[User]) -> Result<String, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["id", "email", "full_name", "is_active", "created_at"])?;
    for student in students {
        writer.write_record([
            student.id.as_str(),
            student.email.as_str(),
            student.full_name.as_str(),
            if student.is_active { "true" } else { "false" },
            format_primitive(student.created_at).as_str(),
        ])?;
    }
    let bytes = writer.into_inner().map_err(|err| csv::Error::from(err.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
