use axum::{
    extract::{Query, State},
    Json,
};
use tracing::{instrument, warn};

use super::dto::{
    MatchRequest, MatchResponse, PopularItem, PopularQuery, SaveFavoriteRequest,
    SaveFavoriteResponse,
};
use super::repo::{self, NewRecipe};
use super::services::{self, MatchOutcome};
use crate::devices::ClaimedDeviceId;
use crate::error::AppError;
use crate::ratings;
use crate::state::AppState;

#[instrument(skip(state, body))]
pub async fn match_recipes(
    State(state): State<AppState>,
    Json(body): Json<MatchRequest>,
) -> Result<Json<MatchResponse>, AppError> {
    if body.ingredients.iter().all(|i| i.trim().is_empty()) {
        return Err(AppError::validation("ingredients must be non-empty"));
    }
    let device = ClaimedDeviceId::from_optional(body.device_id);

    let outcome = services::match_recipes(
        &state,
        &body.ingredients,
        body.cuisine.as_deref(),
        body.dietary.as_deref(),
        &device,
    )
    .await?;

    Ok(Json(match outcome {
        MatchOutcome::Database(recipe) => MatchResponse::found(recipe, true),
        MatchOutcome::Generated(recipe) => MatchResponse::found(recipe, false),
        MatchOutcome::NoMatch => MatchResponse::not_found(),
    }))
}

#[instrument(skip(state, body))]
pub async fn save_favorite(
    State(state): State<AppState>,
    Json(body): Json<SaveFavoriteRequest>,
) -> Result<Json<SaveFavoriteResponse>, AppError> {
    if body.rating != 5 {
        return Err(AppError::validation("only 5-star recipes can be saved"));
    }
    if body.title.trim().is_empty() {
        return Err(AppError::validation("title must be non-empty"));
    }
    if body.ingredients.iter().all(|i| i.trim().is_empty()) {
        return Err(AppError::validation("ingredients must be non-empty"));
    }
    let device = ClaimedDeviceId::from_optional(body.device_id);
    if device.is_anonymous() {
        return Err(AppError::validation("device_id must be non-empty"));
    }

    let new = NewRecipe {
        title: body.title.trim().to_string(),
        description: body.description,
        cuisine: body.cuisine,
        servings: body.servings.max(1),
        prep_minutes: body.prep_minutes.max(0),
        cook_minutes: body.cook_minutes.max(0),
        difficulty: repo::clamp_difficulty(body.difficulty.as_deref()).to_string(),
        source: "user_generated",
        submitted_by: Some(device.as_str().to_string()),
        ingredient_lines: body
            .ingredients
            .into_iter()
            .filter(|i| !i.trim().is_empty())
            .collect(),
        instructions: body.instructions,
        nutrition: body.nutrition.unwrap_or_default(),
    };

    let (recipe_id, created) = repo::save_recipe(&state.db, &new).await?;

    // The submitter's 5-star rating goes into the ledger like any
    // other; losing it does not lose the saved recipe.
    if let Err(e) = ratings::repo::record_rating(&state.db, recipe_id, &device, 5).await {
        warn!(recipe_id = %recipe_id, error = %e, "failed to record submitter rating");
    }

    Ok(Json(SaveFavoriteResponse {
        id: recipe_id,
        created,
    }))
}

#[instrument(skip(state))]
pub async fn popular(
    State(state): State<AppState>,
    Query(query): Query<PopularQuery>,
) -> Result<Json<Vec<PopularItem>>, AppError> {
    let limit = query.limit.clamp(1, 50);
    let rows = repo::popular(&state.db, limit).await?;
    let items = rows
        .into_iter()
        .map(|r| PopularItem {
            id: r.id,
            title: r.title,
            cuisine: r.cuisine,
            difficulty: r.difficulty,
            average_rating: ratings::repo::round_average(r.average_rating),
            rating_count: r.rating_count,
        })
        .collect();
    Ok(Json(items))
}
