use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::store::FoodPrediction;

/// A stored prediction as returned to the client.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionRecord {
    pub id: Uuid,
    pub food_name: String,
    pub calories: f64,
    pub fat: f64,
    pub energy: f64,
    pub image_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl PredictionRecord {
    pub fn new(row: FoodPrediction, image_url: String) -> Self {
        Self {
            id: row.id,
            food_name: row.food_name,
            calories: row.calories,
            fat: row.fat,
            energy: row.energy,
            image_url,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub predictions: Vec<PredictionRecord>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    super::services::DEFAULT_HISTORY_LIMIT
}
