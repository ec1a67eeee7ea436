use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use crate::{DedupLedger, EventId, MARKER, Result};

/// SQLite-backed ledger.
///
/// Expiry is stored as unix milliseconds and checked on every read, so a
/// lapsed record is never reported even if the sweep has not run yet.
#[derive(Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    /// Wraps an existing pool. The schema must already be applied.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database file at `path` and applies
    /// the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let ledger = Self::new(pool);
        ledger.run_migrations().await?;

        tracing::info!(path = %path.as_ref().display(), "ledger opened");
        Ok(ledger)
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn expiry_millis(ttl: Duration) -> i64 {
    let ttl = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    now_millis().saturating_add(ttl)
}

#[async_trait]
impl DedupLedger for SqliteLedger {
    async fn exists(&self, id: &EventId) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM processed_events WHERE event_id = ?1 AND expires_at > ?2",
        )
        .bind(id.as_str())
        .bind(now_millis())
        .fetch_optional(&self.pool)
        .await?;

        Ok(found.is_some())
    }

    async fn record(&self, id: &EventId, ttl: Duration) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO processed_events (event_id, marker, expires_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (event_id) DO UPDATE SET
                marker = excluded.marker,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(id.as_str())
        .bind(MARKER)
        .bind(expiry_millis(ttl))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM processed_events WHERE expires_at <= ?1")
            .bind(now_millis())
            .execute(&self.pool)
            .await?;

        let purged = result.rows_affected();
        metrics::counter!("ledger_records_purged_total").increment(purged);
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_saturates() {
        assert_eq!(expiry_millis(Duration::MAX), i64::MAX);
        assert!(expiry_millis(Duration::ZERO) <= now_millis());
    }
}
