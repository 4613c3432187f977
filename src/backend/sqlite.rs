//! `SqliteBackend` - Embedded Fallback Store
//!
//! `TigerStyle`: Last line of durability, zero external dependencies.
//!
//! A single local database file, created on demand. Profile and metadata
//! JSON is stored as TEXT; timestamps as RFC 3339 TEXT via the chrono
//! driver integration. Survives process restarts, unlike the sim backend.

use std::str::FromStr;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use super::record::{
    BackendAnalytics, CollectionStats, DateRange, ListeningEvent, Recommendation,
    RecommendationQuery, UserRecord,
};
use super::{BackendAdapter, BackendId, ProbeResult, StoreError, StoreResult};

// =============================================================================
// SqliteBackend
// =============================================================================

/// SQLite adapter, fixed to the fallback tier.
#[derive(Clone, Debug)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Open (creating if missing) the database at `path` and initialize
    /// the schema.
    ///
    /// # Panics
    /// Panics if `path` is empty.
    ///
    /// # Errors
    /// Returns `Connection` if the file cannot be opened.
    pub async fn new(path: &str) -> StoreResult<Self> {
        assert!(!path.is_empty(), "database path cannot be empty");

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))
            .map_err(|e| {
                StoreError::connection(BackendId::Fallback, format!("bad database path: {e}"))
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| {
                StoreError::connection(BackendId::Fallback, format!("failed to open: {e}"))
            })?;

        let backend = Self { pool };
        backend.init_schema().await?;
        Ok(backend)
    }

    /// In-memory database, for tests that need real SQL without a file.
    ///
    /// # Errors
    /// Returns `Connection` if the pool cannot be created.
    pub async fn in_memory() -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::connection(BackendId::Fallback, e.to_string()))?;

        let backend = Self { pool };
        backend.init_schema().await?;
        Ok(backend)
    }

    async fn init_schema(&self) -> StoreResult<()> {
        // The SQLite driver prepares one statement at a time
        let statements = [
            r"CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                profile TEXT NOT NULL DEFAULT '{}',
                updated_at TEXT NOT NULL
            )",
            r"CREATE TABLE IF NOT EXISTS listening_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                track_id TEXT NOT NULL,
                played_at TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}'
            )",
            r"CREATE INDEX IF NOT EXISTS idx_history_user ON listening_history(user_id)",
            r"CREATE TABLE IF NOT EXISTS recommendations (
                user_id TEXT NOT NULL,
                track_id TEXT NOT NULL,
                score REAL NOT NULL,
                reason TEXT,
                PRIMARY KEY (user_id, track_id)
            )",
        ];

        for sql in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::query(format!("failed to create schema: {e}")))?;
        }

        Ok(())
    }

    /// Close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn map_err(e: sqlx::Error) -> StoreError {
        match e {
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StoreError::connection(BackendId::Fallback, e.to_string())
            }
            other => StoreError::query(other.to_string()),
        }
    }
}

#[async_trait]
impl BackendAdapter for SqliteBackend {
    fn id(&self) -> BackendId {
        BackendId::Fallback
    }

    async fn connect(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::connection(BackendId::Fallback, e.to_string()))?;
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
        let profile = serde_json::Value::Object(user.profile.clone()).to_string();

        sqlx::query(
            r"
            INSERT INTO users (id, profile, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (id) DO UPDATE
            SET profile = excluded.profile, updated_at = excluded.updated_at
            ",
        )
        .bind(&user.id)
        .bind(&profile)
        .bind(Utc::now().to_rfc3339())
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
        let mut tx = self.pool.begin().await.map_err(Self::map_err)?;

        for event in events {
            let metadata = serde_json::Value::Object(event.metadata.clone()).to_string();
            sqlx::query(
                r"
                INSERT INTO listening_history (user_id, track_id, played_at, metadata)
                VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(user_id)
            .bind(&event.track_id)
            .bind(event.played_at.to_rfc3339())
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
            WHERE user_id = ?1
            ORDER BY score DESC, track_id ASC
            LIMIT ?2
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
        // RFC 3339 strings compare lexicographically in timestamp order
        let from = range.from.map(|t| t.to_rfc3339());
        let to = range.to.map(|t| t.to_rfc3339());

        let row = sqlx::query(
            r"
            SELECT COUNT(*) AS total_plays,
                   COUNT(DISTINCT track_id) AS unique_tracks,
                   MAX(played_at) AS last_played_at
            FROM listening_history
            WHERE user_id = ?1
              AND (?2 IS NULL OR played_at >= ?2)
              AND (?3 IS NULL OR played_at < ?3)
            ",
        )
        .bind(user_id)
        .bind(&from)
        .bind(&to)
        .fetch_one(&self.pool)
        .await
        .map_err(Self::map_err)?;

        let total_plays: i64 = row.try_get("total_plays").map_err(Self::map_err)?;
        let unique_tracks: i64 = row.try_get("unique_tracks").map_err(Self::map_err)?;
        let last_played_raw: Option<String> =
            row.try_get("last_played_at").map_err(Self::map_err)?;

        let last_played_at = match last_played_raw {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(&raw)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| StoreError::internal(format!("bad stored timestamp: {e}")))?,
            ),
            None => None,
        };

        Ok(BackendAnalytics {
            total_plays: total_plays as u64,
            unique_tracks: unique_tracks as u64,
            last_played_at,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn collection_stats(&self) -> StoreResult<Vec<CollectionStats>> {
        let mut stats = Vec::with_capacity(3);

        // No per-table size accounting in SQLite; estimate from content
        let queries = [
            (
                "users",
                "SELECT COUNT(*) AS documents, \
                 COALESCE(SUM(LENGTH(id) + LENGTH(profile)), 0) AS size_bytes FROM users",
            ),
            (
                "listening_history",
                "SELECT COUNT(*) AS documents, \
                 COALESCE(SUM(LENGTH(user_id) + LENGTH(track_id) + LENGTH(metadata)), 0) \
                 AS size_bytes FROM listening_history",
            ),
            (
                "recommendations",
                "SELECT COUNT(*) AS documents, \
                 COALESCE(SUM(LENGTH(user_id) + LENGTH(track_id) + \
                 COALESCE(LENGTH(reason), 0) + 8), 0) AS size_bytes FROM recommendations",
            ),
        ];

        for (table, sql) in queries {
            match sqlx::query(sql).fetch_one(&self.pool).await {
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
                    tracing::warn!(table, error = %e, "stats query failed");
                }
            }
        }

        Ok(stats)
    }
}

// =============================================================================
// Tests
// =============================================================================
