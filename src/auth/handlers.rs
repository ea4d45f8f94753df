use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{CredentialsRequest, LoginResponse, RefreshResponse, UserResponse},
        extractors::{AuthUser, BearerToken},
    },
    error::{ApiError, ApiResult},
    state::AppState,
    users::User,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", post(create_user).put(update_user))
        .route("/api/login", post(login))
        .route("/api/refresh", post(refresh))
        .route("/api/revoke", post(revoke))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles");
    }
    EMAIL_RE.is_match(email)
}

/// Trims and lowercases; rejects what is not an email or an empty password.
fn validate_credentials(payload: &CredentialsRequest) -> ApiResult<String> {
    let email = payload.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        warn!("invalid email");
        return Err(ApiError::BadRequest("Invalid email".into()));
    }
    if payload.password.is_empty() {
        warn!("empty password");
        return Err(ApiError::BadRequest("Password is required".into()));
    }
    Ok(email)
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let email = validate_credentials(&payload)?;
    let hash = state.sessions.hash_password(&payload.password).await?;

    let Some(user) = User::create(&state.db, &email, &hash).await? else {
        warn!(email = %email, "email already registered");
        return Err(ApiError::Conflict("Email already registered"));
    };

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CredentialsRequest>,
) -> ApiResult<Json<UserResponse>> {
    let email = validate_credentials(&payload)?;
    if let Some(other) = User::find_by_email(&state.db, &email).await? {
        if other.id != user_id {
            warn!(user_id = %user_id, "email already registered");
            return Err(ApiError::Conflict("Email already registered"));
        }
    }

    let hash = state.sessions.hash_password(&payload.password).await?;
    let updated = state
        .sessions
        .replace_credentials(user_id, || {
            User::update_credentials(&state.db, user_id, &email, &hash)
        })
        .await?;
    let Some(user) = updated else {
        let owner = User::find_by_email(&state.db, &email).await?.map(|u| u.id);
        return Err(update_miss(owner, user_id));
    };

    info!(user_id = %user.id, "user credentials replaced");
    Ok(Json(user.into()))
}

/// A credential update that matched no row: either the email was claimed by
/// another account in the meantime, or the account itself is gone.
fn update_miss(email_owner: Option<Uuid>, user_id: Uuid) -> ApiError {
    match email_owner {
        Some(owner) if owner != user_id => {
            warn!(user_id = %user_id, "email claimed concurrently");
            ApiError::Conflict("Email already registered")
        }
        _ => {
            warn!(user_id = %user_id, "credential update matched no user");
            ApiError::NotFound("User not found")
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let email = payload.email.trim().to_lowercase();
    let user = User::find_by_email(&state.db, &email).await?;

    let matched = state
        .sessions
        .check_password(&payload.password, user.as_ref().map(|u| u.hashed_password.as_str()))
        .await?;
    let user = match user {
        Some(u) if matched => u,
        Some(u) => {
            warn!(user_id = %u.id, "login invalid password");
            return Err(ApiError::InvalidCredentials);
        }
        None => {
            warn!("login unknown email");
            return Err(ApiError::InvalidCredentials);
        }
    };

    let session = state.sessions.start_session(user.id).await?;
    info!(user_id = %user.id, "user logged in");
    Ok(Json(LoginResponse {
        user: user.into(),
        token: session.access_token,
        refresh_token: session.refresh_token,
    }))
}

#[instrument(skip_all)]
pub async fn refresh(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> ApiResult<Json<RefreshResponse>> {
    let token = state.sessions.refresh(&token).await?;
    Ok(Json(RefreshResponse { token }))
}

#[instrument(skip_all)]
pub async fn revoke(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> ApiResult<StatusCode> {
    state.sessions.revoke(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}
