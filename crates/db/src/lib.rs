//! SQLite connection pool and the migration runner fed by module migrations.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, routing::get, Router};
use quill_kernel::settings::DatabaseSettings;
use quill_kernel::{InitCtx, Migration, Module};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use thiserror::Error;

/// Bookkeeping table for applied migrations, keyed by `(module, id)`.
const MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _quill_migrations (
        module     TEXT NOT NULL,
        id         TEXT NOT NULL,
        applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        PRIMARY KEY (module, id)
    )
"#;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("invalid database url '{url}': {source}")]
    Url { url: String, source: sqlx::Error },

    #[error("could not connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("migration {module}/{id} failed: {source}")]
    Migration {
        module: String,
        id: &'static str,
        source: sqlx::Error,
    },

    #[error(transparent)]
    Query(#[from] sqlx::Error),
}

/// Cheaply cloneable handle on the application's connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open a pool for `settings.url`, creating the database file if needed.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str(&settings.url)
            .map_err(|source| DbError::Url {
                url: settings.url.clone(),
                source,
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .connect_with(options)
            .await
            .map_err(DbError::Connect)?;

        tracing::info!(target: "quill-db", url = %settings.url, "database pool ready");
        Ok(Self { pool })
    }

    /// A private in-memory database.
    ///
    /// Every SQLite memory connection is its own database, so the pool is
    /// pinned to a single connection that never expires.
    pub async fn in_memory() -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|source| DbError::Url {
                url: "sqlite::memory:".to_string(),
                source,
            })?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(DbError::Connect)?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply every migration not yet recorded, in the order given.
    /// Each migration and its bookkeeping row commit in one transaction.
    /// Returns how many were applied.
    pub async fn migrate(&self, migrations: &[(String, Migration)]) -> Result<usize, DbError> {
        sqlx::query(MIGRATIONS_TABLE).execute(&self.pool).await?;

        let mut applied = 0;
        for (module, migration) in migrations {
            let done: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM _quill_migrations WHERE module = ? AND id = ?)",
            )
            .bind(module)
            .bind(migration.id)
            .fetch_one(&self.pool)
            .await?;

            if done {
                tracing::debug!(target: "quill-db", %module, id = migration.id, "migration already applied");
                continue;
            }

            let mut tx = self.pool.begin().await?;
            sqlx::raw_sql(migration.up)
                .execute(&mut *tx)
                .await
                .map_err(|source| DbError::Migration {
                    module: module.clone(),
                    id: migration.id,
                    source,
                })?;
            sqlx::query("INSERT INTO _quill_migrations (module, id) VALUES (?, ?)")
                .bind(module)
                .bind(migration.id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            tracing::info!(target: "quill-db", %module, id = migration.id, "migration applied");
            applied += 1;
        }

        Ok(applied)
    }

    pub async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Core module owning the pool's lifecycle.
pub struct DbModule {
    db: Database,
}

impl DbModule {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Module for DbModule {
    fn name(&self) -> &'static str {
        "db"
    }

    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        self.db.ping().await?;
        tracing::info!(module = self.name(), "database reachable");
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .with_state(self.db.clone())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.db.pool.close().await;
        tracing::info!(module = self.name(), "database pool closed");
        Ok(())
    }
}

async fn health_check(State(db): State<Database>) -> (StatusCode, &'static str) {
    match db.ping().await {
        Ok(()) => (StatusCode::OK, "database is healthy"),
        Err(e) => {
            tracing::error!(error = %e, "database health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "database is unavailable")
        }
    }
}

pub fn create_module(db: Database) -> Arc<dyn Module> {
    Arc::new(DbModule::new(db))
}
