use crate::config::AppConfig;
use crate::db;
use crate::users::repo::UserStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let store = db::connect(&config.database_url).await?;
        Ok(Self::from_parts(store, config))
    }

    pub fn from_parts(store: Arc<dyn UserStore>, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }

    /// State over a fresh in-memory SQLite database.
    #[cfg(test)]
    pub async fn fake() -> Self {
        use crate::config::{JwtConfig, ListingConfig};
        use crate::users::repo::SqliteUserStore;

        let pool = db::sqlite_in_memory().await.expect("in-memory sqlite");
        let config = Arc::new(AppConfig {
            database_url: "sqlite::memory:".into(),
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
            listing: ListingConfig::default(),
            admin_seed: None,
            host: "127.0.0.1".into(),
            port: 0,
        });

        Self::from_parts(Arc::new(SqliteUserStore::new(pool)), config)
    }
}
