//! Store Records
//!
//! `TigerStyle`: Explicit data model, validated at construction.
//!
//! Ownership: each backend holds an independent copy of every record. There
//! are no cross-backend foreign keys; consistency across backends is
//! best-effort and surfaced through per-backend results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{
    LISTENING_BATCH_COUNT_MAX, RECOMMENDATIONS_LIMIT_DEFAULT, RECOMMENDATIONS_LIMIT_MAX,
    TRACK_ID_BYTES_MAX, USER_ID_BYTES_MAX, USER_PROFILE_BYTES_MAX,
};

use super::error::{StoreError, StoreResult};

// =============================================================================
// UserRecord
// =============================================================================

/// A user profile.
///
/// `id` is required and unique per backend; everything else is free-form
/// profile data carried as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    /// Unique user ID
    pub id: String,

    /// Arbitrary profile fields
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl UserRecord {
    /// Create a user record with an empty profile.
    ///
    /// # Errors
    /// Returns `Validation` if the ID is empty or too long.
    pub fn new(id: impl Into<String>) -> StoreResult<Self> {
        let id = id.into();
        validate_user_id(&id)?;

        Ok(Self {
            id,
            profile: Map::new(),
        })
    }

    /// Set a profile field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.profile.insert(key.into(), value);
        self
    }

    /// Build from a raw JSON object, as delivered by a route handler.
    ///
    /// # Errors
    /// Returns `Validation` if `id` is missing, not a string, or invalid.
    pub fn from_json(body: Value) -> StoreResult<Self> {
        let Value::Object(mut fields) = body else {
            return Err(StoreError::validation("user payload must be an object"));
        };

        let id = match fields.remove("id") {
            Some(Value::String(id)) => id,
            Some(_) => return Err(StoreError::validation("user id must be a string")),
            None => return Err(StoreError::validation("user id is required")),
        };
        validate_user_id(&id)?;

        Ok(Self { id, profile: fields })
    }

    /// Check the serialized profile size against the storage cap.
    ///
    /// Called before any I/O so an oversized profile never reaches a
    /// backend.
    ///
    /// # Errors
    /// Returns `Validation` when the profile exceeds the cap or cannot be
    /// serialized.
    pub fn validate_profile_size(&self) -> StoreResult<()> {
        let bytes = serde_json::to_vec(&self.profile)
            .map_err(|e| StoreError::validation(format!("profile not serializable: {e}")))?
            .len();

        if bytes > USER_PROFILE_BYTES_MAX {
            return Err(StoreError::validation(format!(
                "user profile is {bytes} bytes, exceeds {USER_PROFILE_BYTES_MAX}"
            )));
        }
        Ok(())
    }
}

fn validate_user_id(id: &str) -> StoreResult<()> {
    if id.is_empty() {
        return Err(StoreError::validation("user id is required"));
    }
    if id.len() > USER_ID_BYTES_MAX {
        return Err(StoreError::validation(format!(
            "user id exceeds {USER_ID_BYTES_MAX} bytes"
        )));
    }
    Ok(())
}

// =============================================================================
// ListeningEvent
// =============================================================================

/// One play of one track. Append-only: never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListeningEvent {
    /// User who listened
    pub user_id: String,

    /// Track that was played
    pub track_id: String,

    /// When the play happened
    pub played_at: DateTime<Utc>,

    /// Free-form event context (device, duration, skip position, ...)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl ListeningEvent {
    /// Create a listening event timestamped now.
    ///
    /// # Errors
    /// Returns `Validation` on empty or oversized IDs.
    pub fn new(user_id: impl Into<String>, track_id: impl Into<String>) -> StoreResult<Self> {
        let user_id = user_id.into();
        let track_id = track_id.into();

        validate_user_id(&user_id)?;
        if track_id.is_empty() {
            return Err(StoreError::validation("track id is required"));
        }
        if track_id.len() > TRACK_ID_BYTES_MAX {
            return Err(StoreError::validation(format!(
                "track id exceeds {TRACK_ID_BYTES_MAX} bytes"
            )));
        }

        Ok(Self {
            user_id,
            track_id,
            played_at: Utc::now(),
            metadata: Map::new(),
        })
    }

    /// Set the play timestamp.
    #[must_use]
    pub fn with_played_at(mut self, played_at: DateTime<Utc>) -> Self {
        self.played_at = played_at;
        self
    }

    /// Attach a metadata field.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Validate a batch of listening events for one user before any I/O.
///
/// # Errors
/// Returns `Validation` if the batch is empty, oversized, or contains an
/// event for a different user.
pub fn validate_listening_batch(user_id: &str, events: &[ListeningEvent]) -> StoreResult<()> {
    validate_user_id(user_id)?;

    if events.is_empty() {
        return Err(StoreError::validation("listening batch is empty"));
    }
    if events.len() > LISTENING_BATCH_COUNT_MAX {
        return Err(StoreError::validation(format!(
            "listening batch exceeds {LISTENING_BATCH_COUNT_MAX} events"
        )));
    }
    if let Some(stray) = events.iter().find(|e| e.user_id != user_id) {
        return Err(StoreError::validation(format!(
            "event for user {} in batch for user {user_id}",
            stray.user_id
        )));
    }

    Ok(())
}

// =============================================================================
// Recommendations
// =============================================================================

/// A stored recommendation for a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    /// Recommended track
    pub track_id: String,

    /// Relevance score, higher is better
    pub score: f64,

    /// Optional explanation from the scoring engine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Recommendation {
    /// Create a recommendation.
    #[must_use]
    pub fn new(track_id: impl Into<String>, score: f64) -> Self {
        Self {
            track_id: track_id.into(),
            score,
            reason: None,
        }
    }

    /// Attach an explanation.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Options for a recommendation read.
#[derive(Debug, Clone, Copy)]
pub struct RecommendationQuery {
    /// Maximum results (default: 10)
    pub limit: usize,
}

impl RecommendationQuery {
    /// Create a query with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the result limit.
    ///
    /// # Panics
    /// Panics if limit is 0 or exceeds the maximum.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        assert!(
            limit > 0 && limit <= RECOMMENDATIONS_LIMIT_MAX,
            "limit must be 1-{RECOMMENDATIONS_LIMIT_MAX}: got {limit}"
        );
        self.limit = limit;
        self
    }
}

impl Default for RecommendationQuery {
    fn default() -> Self {
        Self {
            limit: RECOMMENDATIONS_LIMIT_DEFAULT,
        }
    }
}

// =============================================================================
// Analytics
// =============================================================================

/// Half-open date range filter for analytics reads.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DateRange {
    /// Inclusive start
    pub from: Option<DateTime<Utc>>,
    /// Exclusive end
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Unbounded range.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Bounded range.
    ///
    /// # Panics
    /// Panics if from > to.
    #[must_use]
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        assert!(from <= to, "range start must be <= end");
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    /// Check whether a timestamp falls inside the range.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at < to)
    }
}

/// Backend-local listening aggregate for one user.
///
/// Absent data is success with zero counts, not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BackendAnalytics {
    /// Plays inside the queried range
    pub total_plays: u64,

    /// Distinct tracks inside the queried range
    pub unique_tracks: u64,

    /// Play of the most recent event inside the range, if any
    pub last_played_at: Option<DateTime<Utc>>,
}

/// Per-collection storage statistics, the raw input to the cross-backend
/// analytics snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionStats {
    /// Collection (or table) name
    pub name: String,

    /// Number of stored documents
    pub documents: u64,

    /// Estimated on-disk size
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_record_new() {
        let user = UserRecord::new("u1").unwrap();
        assert_eq!(user.id, "u1");
        assert!(user.profile.is_empty());
    }

    #[test]
    fn test_user_record_requires_id() {
        assert!(UserRecord::new("").is_err());
        assert!(UserRecord::new("x".repeat(USER_ID_BYTES_MAX + 1)).is_err());
    }

    #[test]
    fn test_user_record_from_json() {
        let user =
            UserRecord::from_json(json!({"id": "u1", "name": "Alice", "plan": "premium"})).unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.profile.get("name"), Some(&json!("Alice")));

        // id is lifted out of the profile
        assert!(!user.profile.contains_key("id"));
    }

    #[test]
    fn test_user_record_from_json_missing_id() {
        let err = UserRecord::from_json(json!({"name": "Alice"})).unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));

        let err = UserRecord::from_json(json!({"id": 42})).unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));

        let err = UserRecord::from_json(json!(["not", "an", "object"])).unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
    }

    #[test]
    fn test_user_record_json_round_trip() {
        let user = UserRecord::new("u1")
            .unwrap()
            .with_field("name", json!("Alice"));

        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["id"], "u1");
        assert_eq!(value["name"], "Alice");
    }

    #[test]
    fn test_profile_size_cap() {
        let small = UserRecord::new("u1")
            .unwrap()
            .with_field("name", json!("Alice"));
        assert!(small.validate_profile_size().is_ok());

        let big = UserRecord::new("u1").unwrap().with_field(
            "bio",
            Value::String("x".repeat(USER_PROFILE_BYTES_MAX + 1)),
        );
        assert!(big.validate_profile_size().is_err());
    }

    #[test]
    fn test_listening_event_new() {
        let event = ListeningEvent::new("u1", "t1").unwrap();
        assert_eq!(event.user_id, "u1");
        assert_eq!(event.track_id, "t1");
    }

    #[test]
    fn test_listening_event_validation() {
        assert!(ListeningEvent::new("", "t1").is_err());
        assert!(ListeningEvent::new("u1", "").is_err());
    }

    #[test]
    fn test_validate_listening_batch() {
        let events = vec![
            ListeningEvent::new("u1", "t1").unwrap(),
            ListeningEvent::new("u1", "t2").unwrap(),
        ];
        assert!(validate_listening_batch("u1", &events).is_ok());

        // empty batch
        assert!(validate_listening_batch("u1", &[]).is_err());

        // stray user
        let mixed = vec![
            ListeningEvent::new("u1", "t1").unwrap(),
            ListeningEvent::new("u2", "t2").unwrap(),
        ];
        assert!(validate_listening_batch("u1", &mixed).is_err());
    }

    #[test]
    fn test_recommendation_query_defaults() {
        let query = RecommendationQuery::new();
        assert_eq!(query.limit, RECOMMENDATIONS_LIMIT_DEFAULT);

        let query = query.with_limit(25);
        assert_eq!(query.limit, 25);
    }

    #[test]
    #[should_panic(expected = "limit must be")]
    fn test_recommendation_query_zero_limit() {
        let _ = RecommendationQuery::new().with_limit(0);
    }

    #[test]
    fn test_date_range_contains() {
        let from = Utc::now();
        let to = from + chrono::Duration::hours(1);
        let range = DateRange::between(from, to);

        assert!(range.contains(from));
        assert!(!range.contains(to)); // exclusive end
        assert!(DateRange::all().contains(from));
    }
}
