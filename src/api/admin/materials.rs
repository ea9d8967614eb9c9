use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::admin::tests::ensure_category;
use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::api::validation::validate_payload;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::repositories::materials::SaveMaterial;
use crate::schemas::material::{MaterialResponse, MaterialSave};

#[derive(Debug, Deserialize)]
struct AdminMaterialQuery {
    #[serde(default, alias = "categoryId")]
    category_id: Option<String>,
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_materials).post(create_material))
        .route("/:material_id", get(get_material).put(update_material).delete(delete_material))
}

fn material_not_found() -> ApiError {
    ApiError::NotFound("Material not found".to_string())
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

async fn checked_params<'a>(
    state: &AppState,
    payload: &'a MaterialSave,
) -> Result<SaveMaterial<'a>, ApiError> {
    validate_payload(payload)?;
    let category_id = non_blank(&payload.category_id);
    ensure_category(state, category_id).await?;

    Ok(SaveMaterial {
        title: payload.title.trim(),
        description: non_blank(&payload.description),
        category_id,
        kind: payload.kind,
        url: non_blank(&payload.url),
        body: non_blank(&payload.body),
        is_published: payload.is_published,
    })
}

async fn list_materials(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Query(params): Query<AdminMaterialQuery>,
) -> Result<Json<Vec<MaterialResponse>>, ApiError> {
    let materials =
        repositories::materials::list(state.db(), false, params.category_id.as_deref())
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list materials"))?;
    Ok(Json(materials.into_iter().map(MaterialResponse::from_db).collect()))
}

async fn get_material(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Path(material_id): Path<String>,
) -> Result<Json<MaterialResponse>, ApiError> {
    let material = repositories::materials::find_by_id(state.db(), &material_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch material"))?
        .ok_or_else(material_not_found)?;
    Ok(Json(MaterialResponse::from_db(material)))
}

async fn create_material(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<MaterialSave>,
) -> Result<(StatusCode, Json<MaterialResponse>), ApiError> {
    let params = checked_params(&state, &payload).await?;
    let material = repositories::materials::create(
        state.db(),
        &Uuid::new_v4().to_string(),
        params,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create material"))?;

    tracing::info!(admin_id = %admin.id, material_id = %material.id, "Material created");
    Ok((StatusCode::CREATED, Json(MaterialResponse::from_db(material))))
}

async fn update_material(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Path(material_id): Path<String>,
    Json(payload): Json<MaterialSave>,
) -> Result<Json<MaterialResponse>, ApiError> {
    let params = checked_params(&state, &payload).await?;
    let material =
        repositories::materials::replace(state.db(), &material_id, params, primitive_now_utc())
            .await
            .map_err(|e| ApiError::internal(e, "Failed to update material"))?
            .ok_or_else(material_not_found)?;
    Ok(Json(MaterialResponse::from_db(material)))
}

async fn delete_material(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Path(material_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deleted = repositories::materials::delete_by_id(state.db(), &material_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete material"))?;
    if !deleted {
        return Err(material_not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}
