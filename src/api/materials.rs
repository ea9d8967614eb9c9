use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::errors::ApiError;
use crate::api::guards::Principal;
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::material::MaterialResponse;

#[derive(Debug, Deserialize)]
struct MaterialQuery {
    #[serde(default, alias = "categoryId")]
    category_id: Option<String>,
}

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/", get(list_materials))
}

async fn list_materials(
    _principal: Principal,
    State(state): State<AppState>,
    Query(params): Query<MaterialQuery>,
) -> Result<Json<Vec<MaterialResponse>>, ApiError> {
    let materials =
        repositories::materials::list(state.db(), true, params.category_id.as_deref())
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list materials"))?;

    Ok(Json(materials.into_iter().map(MaterialResponse::from_db).collect()))
}
