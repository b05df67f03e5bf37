use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::generate::NutritionFacts;

#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub cuisine: Option<String>,
    #[serde(default)]
    pub dietary: Option<String>,
    #[serde(default, alias = "deviceId")]
    pub device_id: Option<String>,
}

/// Either `{found: false}` or `{found: true, fromDatabase, recipe}`.
/// `fromDatabase` keeps the wire name the mobile client consumes.
#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub found: bool,
    #[serde(rename = "fromDatabase", skip_serializing_if = "Option::is_none")]
    pub from_database: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe: Option<RecipePayload>,
}

impl MatchResponse {
    pub fn not_found() -> Self {
        Self {
            found: false,
            from_database: None,
            recipe: None,
        }
    }

    pub fn found(recipe: RecipePayload, from_database: bool) -> Self {
        Self {
            found: true,
            from_database: Some(from_database),
            recipe: Some(recipe),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecipePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub cuisine: String,
    pub servings: i32,
    pub prep_minutes: i32,
    pub cook_minutes: i32,
    pub difficulty: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub nutrition: NutritionFacts,
    pub average_rating: f64,
    pub rating_count: i32,
}

#[derive(Debug, Deserialize)]
pub struct SaveFavoriteRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cuisine: String,
    #[serde(default = "default_servings")]
    pub servings: i32,
    #[serde(default)]
    pub prep_minutes: i32,
    #[serde(default)]
    pub cook_minutes: i32,
    #[serde(default)]
    pub difficulty: Option<String>,
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub nutrition: Option<NutritionFacts>,
    #[serde(default, alias = "deviceId")]
    pub device_id: Option<String>,
    pub rating: i32,
}

fn default_servings() -> i32 {
    2
}

#[derive(Debug, Serialize)]
pub struct SaveFavoriteResponse {
    pub id: Uuid,
    pub created: bool,
}

#[derive(Debug, Deserialize)]
pub struct PopularQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    10
}

#[derive(Debug, Serialize)]
pub struct PopularItem {
    pub id: Uuid,
    pub title: String,
    pub cuisine: String,
    pub difficulty: String,
    pub average_rating: f64,
    pub rating_count: i32,
}
