//! Device-scoped state: claimed identity, premium entitlement, migration.

mod dto;
pub mod handlers;
mod identity;
pub mod repo;

pub use identity::ClaimedDeviceId;

use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/devices/:device_id/premium",
            get(handlers::get_premium).post(handlers::update_premium),
        )
        .route("/devices/migrate", post(handlers::migrate_device))
}
