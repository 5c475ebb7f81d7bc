//! PostgreSQL client and connection management

use sqlx::postgres::{PgPool, PgPoolOptions};

use mnemo_config::DatabaseConfig;

use crate::error::PersistenceError;
use crate::schema;

/// PostgreSQL pool wrapper shared by all stores
#[derive(Clone)]
pub struct PgClient {
    pool: PgPool,
}

impl PgClient {
    /// Connect to PostgreSQL with the configured pool bounds
    pub async fn connect(
        config: &DatabaseConfig,
        max_connections: Option<u32>,
    ) -> Result<Self, PersistenceError> {
        let max = max_connections.unwrap_or(config.max_connections);
        tracing::info!(
            host = %config.host,
            database = %config.database,
            max_connections = max,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(max)
            .connect(&config.connect_url())
            .await?;

        Ok(Self { pool })
    }

    /// Ensure the pgvector extension and all tables exist
    pub async fn ensure_schema(&self) -> Result<(), PersistenceError> {
        schema::ensure(&self.pool).await?;
        tracing::info!("Schema ensured");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
