//! `MongoBackend` - Primary Document Store
//!
//! `TigerStyle`: Document-native storage for the richest query surface.
//!
//! Collections mirror the shared data model: `users` keyed by `_id`,
//! append-only `listening_history`, and `recommendations` keyed by
//! `(user_id, track_id)`. Play timestamps are stored as native BSON
//! datetimes so range filters use index-friendly comparisons.

use std::time::Instant;

use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::ErrorKind;
use mongodb::options::{ClientOptions, FindOptions, ReplaceOptions};
use mongodb::{Client, Database};

use super::record::{
    BackendAnalytics, CollectionStats, DateRange, ListeningEvent, Recommendation,
    RecommendationQuery, UserRecord,
};
use super::{BackendAdapter, BackendId, ProbeResult, StoreError, StoreResult};

const SERVER_SELECTION_TIMEOUT_MS: u64 = 5_000;

// =============================================================================
// MongoBackend
// =============================================================================

/// MongoDB adapter, fixed to the primary tier.
#[derive(Clone, Debug)]
pub struct MongoBackend {
    database: Database,
}

impl MongoBackend {
    /// Connect to a MongoDB deployment.
    ///
    /// # Panics
    /// Panics if `uri` or `database` is empty.
    ///
    /// # Errors
    /// Returns `Connection` if the client cannot be configured or the
    /// deployment is unreachable.
    pub async fn new(uri: &str, database: &str) -> StoreResult<Self> {
        assert!(!uri.is_empty(), "connection URI cannot be empty");
        assert!(!database.is_empty(), "database name cannot be empty");

        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| StoreError::connection(BackendId::Primary, format!("bad URI: {e}")))?;
        options.server_selection_timeout =
            Some(std::time::Duration::from_millis(SERVER_SELECTION_TIMEOUT_MS));

        let client = Client::with_options(options)
            .map_err(|e| StoreError::connection(BackendId::Primary, e.to_string()))?;

        let backend = Self {
            database: client.database(database),
        };
        backend.connect().await?;
        Ok(backend)
    }

    fn map_err(e: &mongodb::error::Error) -> StoreError {
        match *e.kind {
            ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } => {
                StoreError::connection(BackendId::Primary, e.to_string())
            }
            _ => StoreError::query(e.to_string()),
        }
    }

    fn range_filter(user_id: &str, range: &DateRange) -> Document {
        let mut filter = doc! { "user_id": user_id };

        let mut bounds = Document::new();
        if let Some(from) = range.from {
            bounds.insert("$gte", Bson::DateTime(from.into()));
        }
        if let Some(to) = range.to {
            bounds.insert("$lt", Bson::DateTime(to.into()));
        }
        if !bounds.is_empty() {
            filter.insert("played_at", bounds);
        }

        filter
    }

    // collStats reports Int32, Int64, or Double depending on server version
    fn stat_u64(reply: &Document, key: &str) -> u64 {
        match reply.get(key) {
            Some(Bson::Int32(v)) => (*v).max(0) as u64,
            Some(Bson::Int64(v)) => (*v).max(0) as u64,
            Some(Bson::Double(v)) => {
                if v.is_finite() && *v > 0.0 {
                    *v as u64
                } else {
                    0
                }
            }
            _ => 0,
        }
    }
}

#[async_trait]
impl BackendAdapter for MongoBackend {
    fn id(&self) -> BackendId {
        BackendId::Primary
    }

    async fn connect(&self) -> StoreResult<()> {
        self.database
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| StoreError::connection(BackendId::Primary, e.to_string()))?;
        Ok(())
    }

    async fn health_probe(&self) -> ProbeResult {
        let started = Instant::now();
        match self.database.run_command(doc! { "ping": 1 }, None).await {
            Ok(_) => ProbeResult::connected(started.elapsed().as_millis() as u64),
            Err(e) => ProbeResult::unreachable(e.to_string()),
        }
    }

    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    async fn upsert_user(&self, user: &UserRecord) -> StoreResult<()> {
        let mut document = mongodb::bson::to_document(&user.profile)
            .map_err(|e| StoreError::internal(format!("profile not representable: {e}")))?;
        document.insert("_id", &user.id);

        self.database
            .collection::<Document>("users")
            .replace_one(
                doc! { "_id": &user.id },
                document,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await
            .map_err(|e| Self::map_err(&e))?;

        Ok(())
    }

    #[tracing::instrument(skip(self, events), fields(user_id, count = events.len()))]
    async fn append_listening_events(
        &self,
        user_id: &str,
        events: &[ListeningEvent],
    ) -> StoreResult<()> {
        let documents: StoreResult<Vec<Document>> = events
            .iter()
            .map(|event| {
                let metadata = mongodb::bson::to_document(&event.metadata)
                    .map_err(|e| StoreError::internal(format!("metadata not representable: {e}")))?;
                Ok(doc! {
                    "user_id": user_id,
                    "track_id": &event.track_id,
                    "played_at": Bson::DateTime(event.played_at.into()),
                    "metadata": metadata,
                })
            })
            .collect();

        self.database
            .collection::<Document>("listening_history")
            .insert_many(documents?, None)
            .await
            .map_err(|e| Self::map_err(&e))?;

        Ok(())
    }

    #[tracing::instrument(skip(self, query), fields(user_id))]
    async fn query_recommendations(
        &self,
        user_id: &str,
        query: &RecommendationQuery,
    ) -> StoreResult<Vec<Recommendation>> {
        let options = FindOptions::builder()
            .sort(doc! { "score": -1, "track_id": 1 })
            .limit(query.limit as i64)
            .build();

        let documents: Vec<Document> = self
            .database
            .collection::<Document>("recommendations")
            .find(doc! { "user_id": user_id }, options)
            .await
            .map_err(|e| Self::map_err(&e))?
            .try_collect()
            .await
            .map_err(|e| Self::map_err(&e))?;

        if documents.is_empty() {
            return Err(StoreError::not_found(format!(
                "recommendations for {user_id}"
            )));
        }

        documents
            .into_iter()
            .map(|document| {
                mongodb::bson::from_document(document)
                    .map_err(|e| StoreError::internal(format!("malformed recommendation: {e}")))
            })
            .collect()
    }

    #[tracing::instrument(skip(self, range), fields(user_id))]
    async fn query_analytics(
        &self,
        user_id: &str,
        range: &DateRange,
    ) -> StoreResult<BackendAnalytics> {
        let filter = Self::range_filter(user_id, range);
        let history = self.database.collection::<Document>("listening_history");

        let total_plays = history
            .count_documents(filter.clone(), None)
            .await
            .map_err(|e| Self::map_err(&e))?;

        let unique_tracks = history
            .distinct("track_id", filter.clone(), None)
            .await
            .map_err(|e| Self::map_err(&e))?
            .len() as u64;

        let last_played_at = history
            .find_one(
                filter,
                mongodb::options::FindOneOptions::builder()
                    .sort(doc! { "played_at": -1 })
                    .build(),
            )
            .await
            .map_err(|e| Self::map_err(&e))?
            .and_then(|document| match document.get("played_at") {
                Some(Bson::DateTime(ts)) => Some(ts.to_chrono()),
                _ => None,
            });

        Ok(BackendAnalytics {
            total_plays,
            unique_tracks,
            last_played_at,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn collection_stats(&self) -> StoreResult<Vec<CollectionStats>> {
        let mut stats = Vec::with_capacity(3);

        for name in ["users", "listening_history", "recommendations"] {
            match self
                .database
                .run_command(doc! { "collStats": name }, None)
                .await
            {
                Ok(reply) => {
                    let documents = Self::stat_u64(&reply, "count");
                    let size_bytes = Self::stat_u64(&reply, "size");
                    stats.push(CollectionStats {
                        name: name.to_string(),
                        documents,
                        size_bytes,
                    });
                }
                Err(e) => {
                    // A missing collection should not sink the whole report
                    tracing::warn!(collection = name, error = %e, "collStats failed");
                }
            }
        }

        Ok(stats)
    }
}
