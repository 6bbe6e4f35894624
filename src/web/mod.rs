pub mod handlers;
mod pages;

use axum::{routing::get, Router};

use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/temp_current", get(handlers::temp_current))
        .route("/temp_api", get(handlers::temp_api))
        .route("/temp_history", get(handlers::temp_history))
        .route("/temp_history_api", get(handlers::temp_history_api))
        .with_state(state)
}
