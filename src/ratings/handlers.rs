use axum::{
    extract::{Path, State},
    Json,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{RateRequest, RateResponse};
use super::repo;
use crate::devices::ClaimedDeviceId;
use crate::error::AppError;
use crate::state::AppState;

#[instrument(skip(state, body))]
pub async fn rate_recipe(
    State(state): State<AppState>,
    Path(recipe_id): Path<Uuid>,
    Json(body): Json<RateRequest>,
) -> Result<Json<RateResponse>, AppError> {
    if !(1..=5).contains(&body.rating) {
        return Err(AppError::validation("rating must be between 1 and 5"));
    }
    let device = ClaimedDeviceId::from_optional(body.device_id);
    if device.is_anonymous() {
        return Err(AppError::validation("device_id must be non-empty"));
    }

    let aggregate = repo::record_rating(&state.db, recipe_id, &device, body.rating)
        .await?
        .ok_or(AppError::NotFound("recipe"))?;

    Ok(Json(RateResponse {
        recipe_id,
        average_rating: repo::round_average(aggregate.average_rating),
        rating_count: aggregate.rating_count,
    }))
}
