use std::sync::Mutex;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::{FoodPrediction, FoodStore, NewPrediction, StoreError, User};

/// In-process store for tests. Timestamps advance by one millisecond per insert
/// so ordering by `created_at` is deterministic.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<Vec<User>>,
    predictions: Mutex<Vec<FoodPrediction>>,
    fail_inserts: bool,
}

impl MemoryStore {
    pub fn failing_inserts() -> Self {
        Self {
            fail_inserts: true,
            ..Self::default()
        }
    }

    pub fn user_count(&self, email: &str) -> usize {
        self.users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.email == email)
            .count()
    }

    pub fn prediction_count(&self) -> usize {
        self.predictions.lock().unwrap().len()
    }

    pub fn user(&self, email: &str) -> Option<User> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned()
    }

    fn next_timestamp(&self) -> OffsetDateTime {
        let n = self.predictions.lock().unwrap().len() + self.users.lock().unwrap().len();
        OffsetDateTime::UNIX_EPOCH + Duration::days(20_000) + Duration::milliseconds(n as i64)
    }
}

#[async_trait]
impl FoodStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.user(email))
    }

    async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        let created_at = self.next_timestamp();
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == email) {
            return Err(StoreError::DuplicateEmail);
        }
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn insert_prediction(&self, new: NewPrediction) -> anyhow::Result<FoodPrediction> {
        if self.fail_inserts {
            anyhow::bail!("insert refused");
        }
        let created_at = self.next_timestamp();
        let row = FoodPrediction {
            id: new.id,
            user_id: new.user_id,
            food_name: new.food_name,
            calories: new.calories,
            fat: new.fat,
            energy: new.energy,
            image_key: new.image_key,
            created_at,
        };
        self.predictions.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn recent_predictions(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> anyhow::Result<Vec<FoodPrediction>> {
        let mut rows: Vec<FoodPrediction> = self
            .predictions
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }
}
