//! Database session: a thin adapter around a single tokio-postgres client.
//!
//! The session owns the transaction boundary. Nothing here auto-commits;
//! the orchestrator issues `BEGIN` once and exactly one of `COMMIT` or
//! `ROLLBACK` at the end of the run.

use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Result, UpsertError};

/// A single exclusive database session.
pub struct PgSession {
    client: Client,
}

impl PgSession {
    /// Open a new session from connection parameters and apply the
    /// configured client encoding.
    pub async fn connect(config: &Config) -> Result<Self> {
        let (client, connection) =
            tokio_postgres::connect(&config.connection_string(), NoTls).await?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!("Connection task ended with error: {}", e);
            }
        });

        let session = Self { client };
        session
            .batch(&format!("SET client_encoding TO '{}'", config.encoding))
            .await?;
        debug!(
            "Connected to {}:{}/{}",
            config.host, config.port, config.database
        );
        Ok(session)
    }

    /// Adopt a pre-opened client. The caller relinquishes the connection;
    /// the session owns its transaction state from here on.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Execute a statement and return the affected-row count.
    pub async fn execute(&self, sql: &str) -> Result<u64> {
        debug!("SQL: {}", sql);
        Ok(self.client.execute(sql, &[]).await?)
    }

    /// Run a query without parameters.
    pub async fn query(&self, sql: &str) -> Result<Vec<Row>> {
        debug!("SQL: {}", sql);
        Ok(self.client.query(sql, &[]).await?)
    }

    /// Run a parameterized query. Only data values are ever parameterized;
    /// identifiers go through `core::identifier` and are concatenated.
    pub async fn query_params(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>> {
        debug!("SQL: {}", sql);
        Ok(self.client.query(sql, params).await?)
    }

    /// Run a parameterized query expected to return exactly one row.
    pub async fn query_one_params(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Row> {
        debug!("SQL: {}", sql);
        Ok(self.client.query_one(sql, params).await?)
    }

    /// Run a query returning a single bigint value.
    pub async fn query_scalar(&self, sql: &str) -> Result<i64> {
        debug!("SQL: {}", sql);
        let row = self.client.query_one(sql, &[]).await?;
        row.try_get::<_, i64>(0).map_err(UpsertError::from)
    }

    /// Execute one or more statements, discarding results.
    pub async fn batch(&self, sql: &str) -> Result<()> {
        debug!("SQL: {}", sql);
        Ok(self.client.batch_execute(sql).await?)
    }

    /// Open the run's transaction.
    pub async fn begin(&self) -> Result<()> {
        self.batch("BEGIN").await
    }

    /// Commit the run's transaction.
    pub async fn commit(&self) -> Result<()> {
        self.batch("COMMIT").await
    }

    /// Roll back the run's transaction.
    pub async fn rollback(&self) -> Result<()> {
        self.batch("ROLLBACK").await
    }

    /// Close the session. Dropping the client disconnects and ends the
    /// spawned connection task.
    pub async fn close(self) {
        drop(self.client);
    }
}
