use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::Principal;
use crate::core::state::AppState;
use crate::db::types::AttemptStatus;
use crate::repositories;
use crate::schemas::session::{
    AnswerResponse, DraftResponse, NavigateRequest, NavigateResponse, SelectAnswerRequest,
    SessionResponse, SubmitResponse,
};
use crate::services::session::{LiveSession, SessionIdentity, SubmitOutcome, SubmitTrigger};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/:attempt_id", get(get_session))
        .route("/:attempt_id/answers/:question_id", put(select_answer))
        .route("/:attempt_id/navigate", post(navigate))
        .route("/:attempt_id/draft", post(save_draft))
        .route("/:attempt_id/submit", post(submit))
}

fn api_prefix(state: &AppState) -> &str {
    &state.settings().api().api_v1_str
}

fn session_not_found() -> ApiError {
    ApiError::NotFound("Session not found".to_string())
}

/// Loads the test and starts (or resumes) the caller's attempt.
pub(crate) async fn open_session(
    principal: Principal,
    State(state): State<AppState>,
    Path(test_id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let live = state
        .sessions()
        .open(principal.session_identity(), &test_id)
        .await
        .map_err(|err| ApiError::from_session(err, api_prefix(&state)))?;

    let controller = live.lock().await;
    Ok(Json(SessionResponse::from_controller(&controller)))
}

/// Finds the caller's live session. An active attempt that lost its live session (restart)
/// is resumed; a submitted one redirects to its results.
async fn resolve_live(
    state: &AppState,
    principal: &Principal,
    attempt_id: &str,
) -> Result<Arc<LiveSession>, ApiError> {
    let identity = principal.session_identity();

    if let Some(live) = state.sessions().get(attempt_id).await {
        return if live.is_owned_by(&identity) { Ok(live) } else { Err(session_not_found()) };
    }

    let results_url = format!("{}/results/{attempt_id}", api_prefix(state));
    match &identity {
        SessionIdentity::Demo { demo_id } => {
            if state.demo_vault().get(demo_id, attempt_id).await.is_some() {
                return Err(ApiError::Redirect(results_url));
            }
            Err(session_not_found())
        }
        SessionIdentity::Student { user_id } => {
            let attempt = repositories::attempts::find_by_id(state.db(), attempt_id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?
                .filter(|attempt| &attempt.user_id == user_id)
                .ok_or_else(session_not_found)?;

            if attempt.status == AttemptStatus::Submitted {
                return Err(ApiError::Redirect(results_url));
            }

            let live = state
                .sessions()
                .open(identity.clone(), &attempt.test_id)
                .await
                .map_err(|err| ApiError::from_session(err, api_prefix(state)))?;
            if live.attempt_id() != attempt_id {
                return Err(session_not_found());
            }
            Ok(live)
        }
    }
}

async fn get_session(
    principal: Principal,
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let live = resolve_live(&state, &principal, &attempt_id).await?;
    let controller = live.lock().await;
    Ok(Json(SessionResponse::from_controller(&controller)))
}

async fn select_answer(
    principal: Principal,
    State(state): State<AppState>,
    Path((attempt_id, question_id)): Path<(String, String)>,
    Json(payload): Json<SelectAnswerRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let live = resolve_live(&state, &principal, &attempt_id).await?;
    let mut controller = live.lock().await;
    controller
        .select_option(&question_id, payload.option_id.as_deref())
        .map_err(|err| ApiError::from_session(err, api_prefix(&state)))?;

    Ok(Json(AnswerResponse {
        question_id,
        chosen_option_id: payload.option_id,
        answered_count: controller.snapshot().answered_count,
    }))
}

async fn navigate(
    principal: Principal,
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
    Json(payload): Json<NavigateRequest>,
) -> Result<Json<NavigateResponse>, ApiError> {
    let navigation = payload.navigation().ok_or_else(|| {
        ApiError::BadRequest("Provide either index or direction".to_string())
    })?;

    let live = resolve_live(&state, &principal, &attempt_id).await?;
    let cursor = live
        .lock()
        .await
        .navigate(navigation)
        .map_err(|err| ApiError::from_session(err, api_prefix(&state)))?;

    Ok(Json(NavigateResponse { cursor }))
}

async fn save_draft(
    principal: Principal,
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
) -> Result<Json<DraftResponse>, ApiError> {
    let live = resolve_live(&state, &principal, &attempt_id).await?;

    let interval = state.settings().exam().auto_save_interval_seconds;
    let rate_key = format!("rl:draft:{attempt_id}");
    if !state.redis().allow(&rate_key, 1, interval).await {
        return Err(ApiError::TooManyRequests("Draft was saved recently, try again later"));
    }

    live.save_draft().await.map_err(|err| ApiError::from_session(err, api_prefix(&state)))?;
    Ok(Json(DraftResponse { saved: true }))
}

async fn submit(
    principal: Principal,
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let prefix = api_prefix(&state);
    let live = match resolve_live(&state, &principal, &attempt_id).await {
        Ok(live) => live,
        Err(ApiError::Redirect(_)) => {
            let outcome = SubmitOutcome::AlreadySubmitted { attempt_id: attempt_id.clone() };
            return Ok(Json(SubmitResponse::from_outcome(&attempt_id, outcome, prefix)));
        }
        Err(err) => return Err(err),
    };

    let outcome = state
        .sessions()
        .submit(&live, SubmitTrigger::Manual)
        .await
        .map_err(|err| ApiError::from_session(err, prefix))?;

    Ok(Json(SubmitResponse::from_outcome(&attempt_id, outcome, prefix)))
}
