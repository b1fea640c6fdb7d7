use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{FoodPrediction, FoodStore, NewPrediction, StoreError, User};

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct PgFoodStore {
    db: PgPool,
}

impl PgFoodStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FoodStore for PgFoodStore {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        let res = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.db)
        .await;

        match res {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                Err(StoreError::DuplicateEmail)
            }
            Err(e) => Err(anyhow::Error::new(e).context("insert user").into()),
        }
    }

    async fn insert_prediction(&self, new: NewPrediction) -> anyhow::Result<FoodPrediction> {
        let row = sqlx::query_as::<_, FoodPrediction>(
            r#"
            INSERT INTO food_predictions (id, user_id, food_name, calories, fat, energy, image_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, food_name, calories, fat, energy, image_key, created_at
            "#,
        )
        .bind(new.id)
        .bind(new.user_id)
        .bind(&new.food_name)
        .bind(new.calories)
        .bind(new.fat)
        .bind(new.energy)
        .bind(&new.image_key)
        .fetch_one(&self.db)
        .await
        .context("insert food prediction")?;
        Ok(row)
    }

    async fn recent_predictions(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> anyhow::Result<Vec<FoodPrediction>> {
        let rows = sqlx::query_as::<_, FoodPrediction>(
            r#"
            SELECT id, user_id, food_name, calories, fat, energy, image_key, created_at
            FROM food_predictions
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .context("list recent predictions")?;
        Ok(rows)
    }
}
