use crate::config::AppConfig;
use crate::generate::{ChatProvider, TextGenerator};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub generator: Arc<dyn TextGenerator>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await?;

        let generator = Arc::new(ChatProvider::new(&config.generator)?) as Arc<dyn TextGenerator>;

        Ok(Self {
            db,
            config,
            generator,
        })
    }

    pub fn from_parts(
        db: PgPool,
        config: Arc<AppConfig>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            db,
            config,
            generator,
        }
    }
}
