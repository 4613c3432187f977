//! `PostgresBackend` - Managed Relational Store
//!
//! `TigerStyle`: Real database storage behind the same adapter contract.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS users (
//!     id TEXT PRIMARY KEY,
//!     profile JSONB NOT NULL DEFAULT '{}',
//!     updated_at TIMESTAMPTZ NOT NULL
//! );
//!
//! CREATE TABLE IF NOT EXISTS listening_history (
//!     id BIGSERIAL PRIMARY KEY,
//!     user_id TEXT NOT NULL,
//!     track_id TEXT NOT NULL,
//!     played_at TIMESTAMPTZ NOT NULL,
//!     metadata JSONB NOT NULL DEFAULT '{}'
//! );
//!
//! CREATE TABLE IF NOT EXISTS recommendations (
//!     user_id TEXT NOT NULL,
//!     track_id TEXT NOT NULL,
//!     score DOUBLE PRECISION NOT NULL,
//!     reason TEXT,
//!     PRIMARY KEY (user_id, track_id)
//! );
//! ```

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

use super::record::{
    BackendAnalytics, CollectionStats, DateRange, ListeningEvent, Recommendation,
    RecommendationQuery, UserRecord,
};
use super::{BackendAdapter, BackendId, ProbeResult, StoreError, StoreResult};

const POOL_CONNECTIONS_MAX: u32 = 10;

// =============================================================================
// PostgresBackend
// =============================================================================

/// PostgreSQL adapter, fixed to the secondary tier.
#[derive(Clone, Debug)]
pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    /// Connect and initialize the schema.
    ///
    /// # Panics
    /// Panics if `connection_string` is empty or not a postgres URL.
    ///
    /// # Errors
    /// Returns `Connection` if the pool cannot be established.
    pub async fn new(connection_string: &str) -> StoreResult<Self> {
        assert!(
            !connection_string.is_empty(),
            "connection string cannot be empty"
        );
        assert!(
            connection_string.starts_with("postgres://")
                || connection_string.starts_with("postgresql://"),
            "connection string must be a postgres URL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(POOL_CONNECTIONS_MAX)
            .connect(connection_string)
            .await
            .map_err(|e| {
                StoreError::connection(BackendId::Secondary, format!("failed to connect: {e}"))
            })?;

        let backend = Self { pool };
        backend.init_schema().await?;
        Ok(backend)
    }

    /// Wrap an existing pool. Useful when sharing a pool across services.
    ///
    /// # Errors
    /// Returns `Query` if schema initialization fails.
    pub async fn from_pool(pool: PgPool) -> StoreResult<Self> {
        let backend = Self { pool };
        backend.init_schema().await?;
        Ok(backend)
    }

    async fn init_schema(&self) -> StoreResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                profile JSONB NOT NULL DEFAULT '{}',
                updated_at TIMESTAMPTZ NOT NULL
            );

            CREATE TABLE IF NOT EXISTS listening_history (
                id BIGSERIAL PRIMARY KEY,
                user_id TEXT NOT NULL,
                track_id TEXT NOT NULL,
                played_at TIMESTAMPTZ NOT NULL,
                metadata JSONB NOT NULL DEFAULT '{}'
            );
            CREATE INDEX IF NOT EXISTS idx_history_user ON listening_history(user_id);
            CREATE INDEX IF NOT EXISTS idx_history_played ON listening_history(played_at DESC);

            CREATE TABLE IF NOT EXISTS recommendations (
                user_id TEXT NOT NULL,
                track_id TEXT NOT NULL,
                score DOUBLE PRECISION NOT NULL,
                reason TEXT,
                PRIMARY KEY (user_id, track_id)
            );
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::query(format!("failed to create schema: {e}")))?;

        Ok(())
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close all pool connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn map_err(e: sqlx::Error) -> StoreError {
        match e {
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StoreError::connection(BackendId::Secondary, e.to_string())
            }
            other => StoreError::query(other.to_string()),
        }
    }
}

#[async_trait]
impl BackendAdapter for PostgresBackend {
    fn id(&self) -> BackendId {
        BackendId::Secondary
    }

    async fn connect(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::connection(BackendId::Secondary, e.to_string()))?;
        Ok(())
    }

    async fn health_probe(&self) -> ProbeResult {
        let started = Instant::now();
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => ProbeResult::connected(started.elapsed().as_millis() as u64),
            Err(e) => ProbeResult::unreachable(e.to_string()),
        }
    }

    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    async fn upsert_user(&self, user: &UserRecord) -> StoreResult<()> {
        let profile = serde_json::Value::Object(user.profile.clone());

        sqlx::query(
            r"
            INSERT INTO users (id, profile, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (id) DO UPDATE
            SET profile = EXCLUDED.profile, updated_at = now()
            ",
        )
        .bind(&user.id)
        .bind(&profile)
        .execute(&self.pool)
        .await
        .map_err(Self::map_err)?;

        Ok(())
    }

    #[tracing::instrument(skip(self, events), fields(user_id, count = events.len()))]
    async fn append_listening_events(
        &self,
        user_id: &str,
        events: &[ListeningEvent],
    ) -> StoreResult<()> {
        // One transaction: the batch lands entirely or not at all
        let mut tx = self.pool.begin().await.map_err(Self::map_err)?;

        for event in events {
            let metadata = serde_json::Value::Object(event.metadata.clone());
            sqlx::query(
                r"
                INSERT INTO listening_history (user_id, track_id, played_at, metadata)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(user_id)
            .bind(&event.track_id)
            .bind(event.played_at)
            .bind(&metadata)
            .execute(&mut *tx)
            .await
            .map_err(Self::map_err)?;
        }

        tx.commit().await.map_err(Self::map_err)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, query), fields(user_id))]
    async fn query_recommendations(
        &self,
        user_id: &str,
        query: &RecommendationQuery,
    ) -> StoreResult<Vec<Recommendation>> {
        let rows = sqlx::query(
            r"
            SELECT track_id, score, reason
            FROM recommendations
            WHERE user_id = $1
            ORDER BY score DESC, track_id ASC
            LIMIT $2
            ",
        )
        .bind(user_id)
        .bind(query.limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::map_err)?;

        if rows.is_empty() {
            return Err(StoreError::not_found(format!(
                "recommendations for {user_id}"
            )));
        }

        rows.iter()
            .map(|row| {
                Ok(Recommendation {
                    track_id: row.try_get("track_id").map_err(Self::map_err)?,
                    score: row.try_get("score").map_err(Self::map_err)?,
                    reason: row.try_get("reason").map_err(Self::map_err)?,
                })
            })
            .collect()
    }

    #[tracing::instrument(skip(self, range), fields(user_id))]
    async fn query_analytics(
        &self,
        user_id: &str,
        range: &DateRange,
    ) -> StoreResult<BackendAnalytics> {
        let row = sqlx::query(
            r"
            SELECT COUNT(*) AS total_plays,
                   COUNT(DISTINCT track_id) AS unique_tracks,
                   MAX(played_at) AS last_played_at
            FROM listening_history
            WHERE user_id = $1
              AND ($2::timestamptz IS NULL OR played_at >= $2)
              AND ($3::timestamptz IS NULL OR played_at < $3)
            ",
        )
        .bind(user_id)
        .bind(range.from)
        .bind(range.to)
        .fetch_one(&self.pool)
        .await
        .map_err(Self::map_err)?;

        let total_plays: i64 = row.try_get("total_plays").map_err(Self::map_err)?;
        let unique_tracks: i64 = row.try_get("unique_tracks").map_err(Self::map_err)?;
        let last_played_at: Option<DateTime<Utc>> =
            row.try_get("last_played_at").map_err(Self::map_err)?;

        Ok(BackendAnalytics {
            total_plays: total_plays as u64,
            unique_tracks: unique_tracks as u64,
            last_played_at,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn collection_stats(&self) -> StoreResult<Vec<CollectionStats>> {
        let mut stats = Vec::with_capacity(3);

        for table in ["users", "listening_history", "recommendations"] {
            let result = sqlx::query(&format!(
                "SELECT COUNT(*) AS documents, \
                 pg_total_relation_size('{table}') AS size_bytes \
                 FROM {table}"
            ))
            .fetch_one(&self.pool)
            .await;

            match result {
                Ok(row) => {
                    let documents: i64 = row.try_get("documents").map_err(Self::map_err)?;
                    let size_bytes: i64 = row.try_get("size_bytes").map_err(Self::map_err)?;
                    stats.push(CollectionStats {
                        name: table.to_string(),
                        documents: documents as u64,
                        size_bytes: size_bytes as u64,
                    });
                }
                Err(e) => {
                    // Skip the table, keep the rest of the report
                    tracing::warn!(table, error = %e, "stats query failed");
                }
            }
        }

        Ok(stats)
    }
}
