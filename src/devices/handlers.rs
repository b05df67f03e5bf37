use axum::{
    extract::{Path, State},
    Json,
};
use tracing::instrument;

use super::dto::{MigrateRequest, MigrateResponse, PremiumResponse, PremiumUpdateRequest};
use super::{repo, ClaimedDeviceId};
use crate::error::AppError;
use crate::state::AppState;

#[instrument(skip(state))]
pub async fn get_premium(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<PremiumResponse>, AppError> {
    let device = ClaimedDeviceId::new(device_id);
    if device.is_anonymous() {
        return Err(AppError::validation("device_id must be non-empty"));
    }

    let row = repo::get_premium(&state.db, &device).await?;
    // Devices exist implicitly; an unknown device is simply not premium.
    Ok(Json(match row {
        Some(r) => PremiumResponse {
            device_id: r.device_id,
            is_premium: r.is_premium,
            purchase_date: r.purchase_date,
        },
        None => PremiumResponse {
            device_id: device.as_str().to_string(),
            is_premium: false,
            purchase_date: None,
        },
    }))
}

#[instrument(skip(state, body))]
pub async fn update_premium(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Json(body): Json<PremiumUpdateRequest>,
) -> Result<Json<PremiumResponse>, AppError> {
    let device = ClaimedDeviceId::new(device_id);
    if device.is_anonymous() {
        return Err(AppError::validation("device_id must be non-empty"));
    }

    let row = repo::upsert_premium(
        &state.db,
        &device,
        body.is_premium,
        body.purchase_date,
        body.purchase_token.as_deref(),
    )
    .await?;

    Ok(Json(PremiumResponse {
        device_id: row.device_id,
        is_premium: row.is_premium,
        purchase_date: row.purchase_date,
    }))
}

#[instrument(skip(state))]
pub async fn migrate_device(
    State(state): State<AppState>,
    Json(body): Json<MigrateRequest>,
) -> Result<Json<MigrateResponse>, AppError> {
    let old = ClaimedDeviceId::new(body.old_device_id);
    let new = ClaimedDeviceId::new(body.new_device_id);
    if old.is_anonymous() || new.is_anonymous() {
        return Err(AppError::validation(
            "old_device_id and new_device_id must be non-empty",
        ));
    }
    if old == new {
        return Err(AppError::validation("device ids must differ"));
    }

    let counts = repo::migrate_device(&state.db, &old, &new).await?;
    Ok(Json(MigrateResponse {
        migrated_views: counts.views,
        migrated_recipes: counts.recipes,
        migrated_premium: counts.premium,
    }))
}
