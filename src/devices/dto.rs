use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Deserialize)]
pub struct PremiumUpdateRequest {
    pub is_premium: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub purchase_date: Option<OffsetDateTime>,
    #[serde(default)]
    pub purchase_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PremiumResponse {
    pub device_id: String,
    pub is_premium: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub purchase_date: Option<OffsetDateTime>,
}

#[derive(Debug, Deserialize)]
pub struct MigrateRequest {
    pub old_device_id: String,
    pub new_device_id: String,
}

#[derive(Debug, Serialize)]
pub struct MigrateResponse {
    pub migrated_views: u64,
    pub migrated_recipes: u64,
    pub migrated_premium: bool,
}
