//! PostgreSQL metric storage over a connection pool.
//!
//! Exactly two tables, both keyed by metric name. Gauge upserts replace,
//! counter upserts accumulate; batches run inside one transaction and the
//! first failing statement aborts the rest.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::info;

use pulse_core::{Metric, MetricKind, PulseError, Result};

use super::Repository;

const UPSERT_GAUGE: &str = "INSERT INTO gauges (name, value) VALUES ($1, $2) \
     ON CONFLICT (name) DO UPDATE SET value = EXCLUDED.value";

const UPSERT_COUNTER: &str = "INSERT INTO counters (name, value) VALUES ($1, $2) \
     ON CONFLICT (name) DO UPDATE SET value = EXCLUDED.value + counters.value";

/// Relational metric storage.
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Create the pool. Connections are established lazily, so this only
    /// fails on an unparseable DSN.
    pub fn new(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(dsn)
            .map_err(|e| PulseError::InvalidConfig {
                reason: format!("failed to create connection pool: {e}"),
            })?;

        Ok(Self { pool })
    }

    /// Create the two tables. Idempotent.
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS gauges \
             (name TEXT PRIMARY KEY, value DOUBLE PRECISION NOT NULL)",
        )
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS counters \
             (name TEXT PRIMARY KEY, value BIGINT NOT NULL)",
        )
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        info!("database schema initialized");
        Ok(())
    }

    /// Close all pool connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Repository for PostgresStorage {
    async fn update_gauge(&self, name: &str, value: f64) -> Result<()> {
        sqlx::query(UPSERT_GAUGE)
            .bind(name)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(())
    }

    async fn update_counter(&self, name: &str, delta: i64) -> Result<()> {
        sqlx::query(UPSERT_COUNTER)
            .bind(name)
            .bind(delta)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(())
    }

    async fn gauge(&self, name: &str) -> Result<f64> {
        sqlx::query_scalar("SELECT value FROM gauges WHERE name = $1")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => PulseError::GaugeNotFound { name: name.to_string() },
                other => db_error(other),
            })
    }

    async fn counter(&self, name: &str) -> Result<i64> {
        sqlx::query_scalar("SELECT value FROM counters WHERE name = $1")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => PulseError::CounterNotFound { name: name.to_string() },
                other => db_error(other),
            })
    }

    async fn updates(&self, metrics: &[Metric]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        for m in metrics {
            match m.kind {
                MetricKind::Gauge => {
                    sqlx::query(UPSERT_GAUGE)
                        .bind(&m.id)
                        .bind(m.value.unwrap_or_default())
                        .execute(&mut *tx)
                        .await
                        .map_err(db_error)?;
                }
                MetricKind::Counter => {
                    sqlx::query(UPSERT_COUNTER)
                        .bind(&m.id)
                        .bind(m.delta.unwrap_or_default())
                        .execute(&mut *tx)
                        .await
                        .map_err(db_error)?;
                }
            }
        }

        tx.commit().await.map_err(db_error)
    }

    async fn gauges(&self) -> Result<Vec<(String, f64)>> {
        let rows = sqlx::query("SELECT name, value FROM gauges")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(rows.iter().map(|row| (row.get("name"), row.get("value"))).collect())
    }

    async fn counters(&self) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query("SELECT name, value FROM counters")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(rows.iter().map(|row| (row.get("name"), row.get("value"))).collect())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(db_error)?;
        Ok(())
    }
}

fn db_error(e: sqlx::Error) -> PulseError {
    PulseError::Database(e.to_string())
}
