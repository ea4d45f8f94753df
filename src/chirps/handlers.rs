use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{ChirpResponse, CreateChirpRequest, ListChirpsQuery},
    profanity::filter_profanity,
    repo_types::Chirp,
};
use crate::{
    auth::{extractors::AuthUser, guard::authorize},
    error::{ApiError, ApiResult},
    state::AppState,
};

pub const MAX_CHIRP_LEN: usize = 140;

pub fn chirp_routes() -> Router<AppState> {
    Router::new()
        .route("/api/chirps", get(list_chirps).post(create_chirp))
        .route("/api/chirps/:chirp_id", get(get_chirp).delete(delete_chirp))
}

/// Length check then profanity masking.
fn clean_body(body: &str) -> ApiResult<String> {
    if body.chars().count() > MAX_CHIRP_LEN {
        return Err(ApiError::BadRequest("Chirp is too long".into()));
    }
    Ok(filter_profanity(body))
}

#[instrument(skip(state, payload))]
pub async fn create_chirp(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateChirpRequest>,
) -> ApiResult<(StatusCode, Json<ChirpResponse>)> {
    let body = clean_body(&payload.body)?;
    let chirp = Chirp::create(&state.db, user_id, &body).await?;
    info!(chirp_id = %chirp.id, user_id = %user_id, "chirp created");
    Ok((StatusCode::CREATED, Json(chirp.into())))
}

#[instrument(skip(state))]
pub async fn list_chirps(
    State(state): State<AppState>,
    Query(q): Query<ListChirpsQuery>,
) -> ApiResult<Json<Vec<ChirpResponse>>> {
    let chirps = Chirp::list(&state.db, q.author_id).await?;
    Ok(Json(chirps.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state))]
pub async fn get_chirp(
    State(state): State<AppState>,
    Path(chirp_id): Path<Uuid>,
) -> ApiResult<Json<ChirpResponse>> {
    let chirp = Chirp::find(&state.db, chirp_id)
        .await?
        .ok_or(ApiError::NotFound("Chirp not found"))?;
    Ok(Json(chirp.into()))
}

/// Existence, then ownership, then deletion.
#[instrument(skip(state))]
pub async fn delete_chirp(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(chirp_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let chirp = Chirp::find(&state.db, chirp_id)
        .await?
        .ok_or(ApiError::NotFound("Chirp not found"))?;

    if !authorize(user_id, chirp.user_id) {
        warn!(user_id = %user_id, chirp_id = %chirp_id, "delete of foreign chirp");
        return Err(ApiError::Forbidden("You can't delete this chirp"));
    }

    if !Chirp::delete(&state.db, chirp_id).await? {
        return Err(ApiError::NotFound("Chirp not found"));
    }
    info!(user_id = %user_id, chirp_id = %chirp_id, "chirp deleted");
    Ok(StatusCode::NO_CONTENT)
}
