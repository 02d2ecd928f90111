use std::{str::FromStr, sync::Arc};

use anyhow::Context;
use sqlx::{
    migrate::MigrateError,
    postgres::PgPoolOptions,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    PgPool, SqlitePool,
};
use tracing::{info, warn};

use crate::users::{
    repo::{PgUserStore, SqliteUserStore, UserStore},
    search::{CaseInsensitivePattern, GenericPattern, SearchStrategy},
};

/// Storage engine class behind `DATABASE_URL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Postgres,
    Sqlite,
}

impl Engine {
    pub fn from_url(url: &str) -> anyhow::Result<Self> {
        let scheme = url.split(':').next().unwrap_or_default();
        match scheme {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "sqlite" => Ok(Self::Sqlite),
            other => anyhow::bail!("unsupported database scheme `{other}`"),
        }
    }

    pub fn search_strategy(self) -> Arc<dyn SearchStrategy> {
        match self {
            Self::Postgres => Arc::new(CaseInsensitivePattern),
            Self::Sqlite => Arc::new(GenericPattern),
        }
    }
}

/// Connects to the configured engine, migrates it and returns its store.
pub async fn connect(database_url: &str) -> anyhow::Result<Arc<dyn UserStore>> {
    let engine = Engine::from_url(database_url)?;

    let store: Arc<dyn UserStore> = match engine {
        Engine::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await
                .context("connect to database")?;
            if let Err(e) = migrate_postgres(&pool).await {
                warn!(error = %e, "migration failed; continuing");
            }
            Arc::new(PgUserStore::new(pool))
        }
        Engine::Sqlite => {
            let options = SqliteConnectOptions::from_str(database_url)
                .context("parse sqlite url")?
                .create_if_missing(true);
            let pool = SqlitePoolOptions::new()
                .max_connections(10)
                .connect_with(options)
                .await
                .context("connect to database")?;
            if let Err(e) = migrate_sqlite(&pool).await {
                warn!(error = %e, "migration failed; continuing");
            }
            Arc::new(SqliteUserStore::new(pool))
        }
    };

    info!(
        engine = ?engine,
        search = store.search_strategy_name(),
        "database ready"
    );
    Ok(store)
}

pub async fn migrate_postgres(pool: &PgPool) -> Result<(), MigrateError> {
    sqlx::migrate!("./migrations/postgres").run(pool).await
}

pub async fn migrate_sqlite(pool: &SqlitePool) -> Result<(), MigrateError> {
    sqlx::migrate!("./migrations/sqlite").run(pool).await
}

/// Single-connection in-memory database; the connection must never be
/// recycled or the data disappears with it.
#[cfg(test)]
pub async fn sqlite_in_memory() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .context("open in-memory sqlite")?;
    migrate_sqlite(&pool).await.context("migrate sqlite")?;
    Ok(pool)
}
