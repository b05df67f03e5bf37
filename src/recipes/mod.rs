//! Recipe matching, saving, and browsing.

mod dto;
pub mod handlers;
pub mod repo;
pub mod services;

use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/recipes/match", post(handlers::match_recipes))
        .route("/recipes/favorite", post(handlers::save_favorite))
        .route("/recipes/popular", get(handlers::popular))
}
