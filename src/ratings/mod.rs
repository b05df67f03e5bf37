//! View/rating ledger: per-device view rows, rating upserts, and the
//! recipe aggregates derived from them.

mod dto;
pub mod handlers;
pub mod repo;

use crate::state::AppState;
use axum::{routing::post, Router};

pub fn router() -> Router<AppState> {
    Router::new().route("/recipes/:id/rate", post(handlers::rate_recipe))
}
