use axum::{
    extract::State,
    response::Html,
    routing::{get, post},
    Router,
};
use tracing::{info, instrument, warn};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
    users::User,
};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/metrics", get(metrics))
        .route("/admin/reset", post(reset))
}

pub(crate) fn metrics_page(hits: u64) -> String {
    format!(
        r#"<html>
  <body>
    <h1>Welcome, Chirpy Admin</h1>
    <p>Chirpy has been visited {hits} times!</p>
  </body>
</html>"#
    )
}

#[instrument(skip(state))]
pub async fn metrics(State(state): State<AppState>) -> Html<String> {
    Html(metrics_page(state.hits.get()))
}

/// Wipes sessions, users (chirps cascade) and the hit counter. Dev only.
#[instrument(skip(state))]
pub async fn reset(State(state): State<AppState>) -> ApiResult<String> {
    if !state.config.is_dev() {
        warn!(platform = %state.config.platform, "reset refused outside dev");
        return Err(ApiError::Forbidden("Reset is only allowed in dev environment"));
    }

    let tokens = state.sessions.refresh_tokens.purge_all().await?;
    let users = User::delete_all(&state.db).await?;
    state.hits.reset();

    info!(users, tokens, "environment reset");
    Ok(format!(
        "Users have been deleted, and counter has been reset: {}\n",
        state.hits.get()
    ))
}
