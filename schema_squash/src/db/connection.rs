//! Database connection handling
//!
//! The catalog is read through a pool connected to the server's
//! `information_schema`; the analysed database is only referenced by name.

use std::time::Duration;

use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::MySqlPool;
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};

/// Connection to the catalog of one MySQL server
#[derive(Debug, Clone)]
pub struct DatabaseConnection {
    pool: MySqlPool,
    database: String,
}

impl DatabaseConnection {
    /// Create a new catalog connection from configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool_size = config.pool_size.unwrap_or(2);
        let timeout_seconds = config.timeout_seconds.unwrap_or(30);

        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.username)
            .password(&config.password)
            .database(&config.schema_database);

        debug!(
            host = %config.host,
            port = config.port,
            schema_database = %config.schema_database,
            "Connecting to catalog"
        );

        let pool = MySqlPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(timeout_seconds))
            .connect_with(options)
            .await
            .map_err(|e| {
                Error::DatabaseError(format!(
                    "Could not connect to {} on {}:{}: {}. The user needs read access to the information schema.",
                    config.schema_database, config.host, config.port, e
                ))
            })?;

        Ok(Self {
            pool,
            database: config.database.clone(),
        })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Name of the analysed database
    pub fn database(&self) -> &str {
        &self.database
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
