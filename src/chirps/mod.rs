mod dto;
pub mod handlers;
pub mod profanity;
pub mod repo;
pub mod repo_types;

use crate::state::AppState;
use axum::Router;

pub use repo_types::Chirp;

pub fn router() -> Router<AppState> {
    handlers::chirp_routes()
}
