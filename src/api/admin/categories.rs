use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::api::validation::validate_payload;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::category::{CategoryCreate, CategoryResponse, CategoryUpdate};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/:category_id", get(get_category).patch(update_category).delete(delete_category))
}

fn category_not_found() -> ApiError {
    ApiError::NotFound("Category not found".to_string())
}

async fn ensure_unique_name(
    state: &AppState,
    name: &str,
    exclude_id: Option<&str>,
) -> Result<(), ApiError> {
    let taken = repositories::categories::exists_by_name(state.db(), name, exclude_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check category name"))?;
    if taken {
        return Err(ApiError::Conflict("Category with this name already exists".to_string()));
    }
    Ok(())
}

async fn list_categories(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryResponse>>, ApiError> {
    let categories = repositories::categories::list(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list categories"))?;
    Ok(Json(categories.into_iter().map(CategoryResponse::from_db).collect()))
}

async fn get_category(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Path(category_id): Path<String>,
) -> Result<Json<CategoryResponse>, ApiError> {
    let category = repositories::categories::find_by_id(state.db(), &category_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch category"))?
        .ok_or_else(category_not_found)?;
    Ok(Json(CategoryResponse::from_db(category)))
}

async fn create_category(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<CategoryCreate>,
) -> Result<(StatusCode, Json<CategoryResponse>), ApiError> {
    validate_payload(&payload)?;
    let name = payload.name.trim();
    ensure_unique_name(&state, name, None).await?;

    let category = repositories::categories::create(
        state.db(),
        &Uuid::new_v4().to_string(),
        name,
        payload.description.as_deref(),
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create category"))?;

    tracing::info!(admin_id = %admin.id, category_id = %category.id, "Category created");
    Ok((StatusCode::CREATED, Json(CategoryResponse::from_db(category))))
}

async fn update_category(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Path(category_id): Path<String>,
    Json(payload): Json<CategoryUpdate>,
) -> Result<Json<CategoryResponse>, ApiError> {
    validate_payload(&payload)?;
    let name = payload.name.as_deref().map(str::trim);
    if let Some(name) = name {
        ensure_unique_name(&state, name, Some(&category_id)).await?;
    }

    let category = repositories::categories::update(
        state.db(),
        &category_id,
        name,
        payload.description.as_deref(),
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update category"))?
    .ok_or_else(category_not_found)?;

    Ok(Json(CategoryResponse::from_db(category)))
}

/// Tests in the category keep existing with no category.
async fn delete_category(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Path(category_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deleted = repositories::categories::delete_by_id(state.db(), &category_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete category"))?;
    if !deleted {
        return Err(category_not_found());
    }

    tracing::info!(admin_id = %admin.id, category_id = %category_id, "Category deleted");
    Ok(StatusCode::NO_CONTENT)
}
