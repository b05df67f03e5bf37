use std::collections::BTreeSet;

use tracing::warn;

use super::dto::RecipePayload;
use super::repo::{self, RecipeDetails, RecipeRow};
use crate::devices::ClaimedDeviceId;
use crate::error::AppError;
use crate::generate::{self, GeneratedRecipe};
use crate::normalize;
use crate::ratings;
use crate::state::AppState;

pub enum MatchOutcome {
    /// A stored recipe matched; its view has already been recorded.
    Database(RecipePayload),
    /// Nothing stored matched; the generation fallback produced this.
    Generated(RecipePayload),
    /// No stored match and generation is not configured.
    NoMatch,
}

/// The full match flow: normalize → exclusion → exact-set match →
/// record view, falling back to the generation pipeline on a miss.
pub async fn match_recipes(
    state: &AppState,
    ingredients: &[String],
    cuisine: Option<&str>,
    dietary: Option<&str>,
    device: &ClaimedDeviceId,
) -> Result<MatchOutcome, AppError> {
    let keys = distinct_core_keys(ingredients);
    if keys.is_empty() {
        return Err(AppError::validation("ingredients must be non-empty"));
    }

    let exclusions = repo::exclusion_set(&state.db, device).await?;

    if let Some(row) = repo::find_exact_match(&state.db, &keys, &exclusions).await? {
        let details = repo::load_details(&state.db, row.id).await?;

        // Must land before the response so the very next request from
        // this device observes the exclusion. A failure here only means
        // the device may see this recipe again; the match still stands.
        if !device.is_anonymous() {
            if let Err(e) = ratings::repo::record_view(&state.db, row.id, device).await {
                warn!(recipe_id = %row.id, device = %device, error = %e, "failed to record view");
            }
        }

        return Ok(MatchOutcome::Database(payload_from_row(row, details)));
    }

    if state.config.generator.api_key.is_empty() {
        return Ok(MatchOutcome::NoMatch);
    }

    let generated =
        generate::generate_recipe(state.generator.as_ref(), ingredients, cuisine, dietary).await?;
    Ok(MatchOutcome::Generated(payload_from_generated(generated)))
}

/// Deduplicated canonical keys for a query's ingredient list. Order is
/// irrelevant to matching; sorting just keeps the query deterministic.
pub fn distinct_core_keys(ingredients: &[String]) -> Vec<String> {
    ingredients
        .iter()
        .map(|s| normalize::core_key(s))
        .filter(|k| !k.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn payload_from_row(row: RecipeRow, details: RecipeDetails) -> RecipePayload {
    RecipePayload {
        id: Some(row.id),
        title: row.title,
        description: row.description,
        cuisine: row.cuisine,
        servings: row.servings,
        prep_minutes: row.prep_minutes,
        cook_minutes: row.cook_minutes,
        difficulty: row.difficulty,
        ingredients: details.ingredients,
        instructions: details.instructions,
        nutrition: details.nutrition,
        average_rating: ratings::repo::round_average(row.average_rating),
        rating_count: row.rating_count,
    }
}

fn payload_from_generated(recipe: GeneratedRecipe) -> RecipePayload {
    RecipePayload {
        id: None,
        title: recipe.title,
        description: recipe.description,
        cuisine: recipe.cuisine,
        servings: recipe.servings,
        prep_minutes: recipe.prep_minutes,
        cook_minutes: recipe.cook_minutes,
        difficulty: recipe.difficulty,
        ingredients: recipe.ingredients,
        instructions: recipe.instructions,
        nutrition: recipe.nutrition,
        average_rating: 0.0,
        rating_count: 0,
    }
}
