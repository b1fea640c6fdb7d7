use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::AppConfig;
use crate::storage::{Storage, StorageClient};
use crate::store::{FoodStore, PgFoodStore};
use crate::vision::{FoodVision, GeminiClient};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn FoodStore>,
    pub storage: Arc<dyn StorageClient>,
    pub vision: Arc<dyn FoodVision>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        run_migrations(&db).await?;

        let storage = Arc::new(Storage::new(&config.storage).await?) as Arc<dyn StorageClient>;
        let vision = Arc::new(GeminiClient::new(&config.gemini)?) as Arc<dyn FoodVision>;

        Ok(Self::from_parts(
            config,
            Arc::new(PgFoodStore::new(db)),
            storage,
            vision,
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn FoodStore>,
        storage: Arc<dyn StorageClient>,
        vision: Arc<dyn FoodVision>,
    ) -> Self {
        Self {
            config,
            store,
            storage,
            vision,
        }
    }
}

async fn run_migrations(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")
}
