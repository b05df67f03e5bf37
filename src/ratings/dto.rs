use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub rating: i32,
    #[serde(default, alias = "deviceId")]
    pub device_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RateResponse {
    pub recipe_id: Uuid,
    pub average_rating: f64,
    pub rating_count: i32,
}
