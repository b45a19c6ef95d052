use std::sync::Arc;

use anyhow::Context;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::config::AppConfig;
use crate::users::repo::SqliteStore;
use crate::users::service::UserDirectory;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub directory: UserDirectory,
}

impl AppState {
    /// Open the store and build the directory on top of it: config,
    /// pool, migrations, then the controller. No process-wide state.
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env());

        let db = SqlitePoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;

        let directory = UserDirectory::new(Arc::new(SqliteStore::new(db.clone())));

        Ok(Self {
            db,
            config,
            directory,
        })
    }

    /// Flush and close the pool. Pending writes are durable once this
    /// returns.
    pub async fn close(&self) {
        self.db.close().await;
    }
}
