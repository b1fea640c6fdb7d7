use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

mod postgres;
#[cfg(test)]
pub mod memory;

pub use postgres::PgFoodStore;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string
    pub created_at: OffsetDateTime,
}

/// One stored answer from the vision service.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FoodPrediction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub food_name: String,
    pub calories: f64,
    pub fat: f64,
    pub energy: f64,
    pub image_key: String, // object storage key
    pub created_at: OffsetDateTime,
}

/// Fields of a prediction row before the database assigns `created_at`.
#[derive(Debug, Clone)]
pub struct NewPrediction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub food_name: String,
    pub calories: f64,
    pub fat: f64,
    pub energy: f64,
    pub image_key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[async_trait]
pub trait FoodStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, StoreError>;
    async fn insert_prediction(&self, new: NewPrediction) -> anyhow::Result<FoodPrediction>;
    /// Newest first, at most `limit` rows.
    async fn recent_predictions(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> anyhow::Result<Vec<FoodPrediction>>;
}
