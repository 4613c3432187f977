//! Recommendation Engine - Listening History to Ranked Suggestions
//!
//! `TigerStyle`: The model is a black box; validate everything it returns.
//!
//! The engine turns a user's recent listening history into a ranked list of
//! track suggestions by prompting a [`LanguageModelProvider`]. Model output
//! is untrusted: scores are range-checked, already-played tracks are
//! filtered out, and the list is re-ranked and truncated locally before it
//! reaches a backend.

use crate::backend::{ListeningEvent, Recommendation};
use crate::constants::{RECOMMENDATIONS_LIMIT_MAX, RECOMMEND_HISTORY_TRACKS_MAX};
use crate::llm::{LanguageModelProvider, PromptRequest, ProviderError};

// =============================================================================
// Error Types
// =============================================================================

/// Errors from recommendation generation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// Input validation failed
    #[error("invalid input: {message}")]
    Validation {
        /// What was invalid
        message: String,
    },

    /// The model call failed
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The model returned something unusable
    #[error("unusable model output: {message}")]
    InvalidOutput {
        /// What was wrong
        message: String,
    },
}

impl EngineError {
    #[must_use]
    fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

// =============================================================================
// Model Output Shape
// =============================================================================

#[derive(Debug, serde::Deserialize)]
struct ModelOutput {
    recommendations: Vec<ModelSuggestion>,
}

#[derive(Debug, serde::Deserialize)]
struct ModelSuggestion {
    track_id: String,
    score: f64,
    #[serde(default)]
    reason: Option<String>,
}

// =============================================================================
// RecommendationEngine
// =============================================================================

/// Generates ranked track suggestions from listening history.
#[derive(Debug, Clone)]
pub struct RecommendationEngine<P: LanguageModelProvider> {
    provider: P,
}

impl<P: LanguageModelProvider> RecommendationEngine<P> {
    /// Create an engine over a model provider.
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Generate up to `limit` suggestions for a user.
    ///
    /// Tracks already present in `history` are never suggested back.
    ///
    /// # Errors
    /// `Validation` for a bad user id or limit, `Provider` when the model
    /// call fails, `InvalidOutput` when the model returns nothing usable.
    #[tracing::instrument(skip(self, history), fields(user_id, history = history.len(), limit))]
    pub async fn generate(
        &self,
        user_id: &str,
        history: &[ListeningEvent],
        limit: usize,
    ) -> Result<Vec<Recommendation>, EngineError> {
        if user_id.is_empty() {
            return Err(EngineError::validation("user id must not be empty"));
        }
        if limit == 0 || limit > RECOMMENDATIONS_LIMIT_MAX {
            return Err(EngineError::validation(format!(
                "limit must be 1-{RECOMMENDATIONS_LIMIT_MAX}: got {limit}"
            )));
        }

        let request = PromptRequest::new(self.build_prompt(user_id, history))
            .with_system("You are a music curator. Respond with JSON only.")
            .with_json_mode();

        let output: ModelOutput = self.provider.complete_json(&request).await?;
        if output.recommendations.is_empty() {
            return Err(EngineError::InvalidOutput {
                message: "model returned no suggestions".to_string(),
            });
        }

        let played: std::collections::HashSet<&str> =
            history.iter().map(|e| e.track_id.as_str()).collect();

        let mut recommendations: Vec<Recommendation> = output
            .recommendations
            .into_iter()
            .filter(|s| !s.track_id.is_empty())
            .filter(|s| (0.0..=1.0).contains(&s.score))
            .filter(|s| !played.contains(s.track_id.as_str()))
            .map(|s| {
                let rec = Recommendation::new(s.track_id, s.score);
                match s.reason {
                    Some(reason) => rec.with_reason(reason),
                    None => rec,
                }
            })
            .collect();

        if recommendations.is_empty() {
            return Err(EngineError::InvalidOutput {
                message: "no suggestion survived validation".to_string(),
            });
        }

        // Local re-rank: never trust model ordering
        recommendations.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.track_id.cmp(&b.track_id))
        });
        recommendations.truncate(limit);

        Ok(recommendations)
    }

    fn build_prompt(&self, user_id: &str, history: &[ListeningEvent]) -> String {
        let recent: Vec<&str> = history
            .iter()
            .rev()
            .take(RECOMMEND_HISTORY_TRACKS_MAX)
            .map(|e| e.track_id.as_str())
            .collect();

        format!(
            "Recommend tracks for user {user_id}. Recently played: [{}]. \
             Respond with a JSON object: {{\"recommendations\": \
             [{{\"track_id\", \"score\", \"reason\"}}]}}.",
            recent.join(", ")
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::SimLanguageModel;

    fn history(tracks: &[&str]) -> Vec<ListeningEvent> {
        tracks
            .iter()
            .map(|t| ListeningEvent::new("u1", *t).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_generates_ranked_suggestions() {
        let engine = RecommendationEngine::new(SimLanguageModel::with_seed(42));

        let recs = engine
            .generate("u1", &history(&["track-a"]), 10)
            .await
            .unwrap();

        assert!(!recs.is_empty());
        for pair in recs.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_deterministic_for_same_seed_and_history() {
        let a = RecommendationEngine::new(SimLanguageModel::with_seed(42));
        let b = RecommendationEngine::new(SimLanguageModel::with_seed(42));

        let h = history(&["track-a", "track-b"]);
        assert_eq!(
            a.generate("u1", &h, 10).await.unwrap(),
            b.generate("u1", &h, 10).await.unwrap(),
        );
    }

    #[tokio::test]
    async fn test_played_tracks_never_suggested() {
        let engine = RecommendationEngine::new(SimLanguageModel::with_seed(42));

        // Play everything the sim pool could suggest except one
        let h = history(&[
            "track-midnight-drive",
            "track-glass-horizon",
            "track-paper-moons",
            "track-static-bloom",
        ]);
        let recs = engine.generate("u1", &h, 10).await;

        if let Ok(recs) = recs {
            for rec in &recs {
                assert!(!h.iter().any(|e| e.track_id == rec.track_id));
            }
        }
        // Err(InvalidOutput) is also legal here: every suggestion was played
    }

    #[tokio::test]
    async fn test_limit_respected() {
        let engine = RecommendationEngine::new(SimLanguageModel::with_seed(42));

        let recs = engine.generate("u1", &history(&[]), 2).await.unwrap();
        assert!(recs.len() <= 2);
    }

    #[tokio::test]
    async fn test_empty_user_rejected() {
        let engine = RecommendationEngine::new(SimLanguageModel::with_seed(42));

        let err = engine.generate("", &[], 10).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_zero_limit_rejected() {
        let engine = RecommendationEngine::new(SimLanguageModel::with_seed(42));

        let err = engine.generate("u1", &[], 0).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_provider_outage_surfaces() {
        let provider = SimLanguageModel::with_seed(42);
        provider.set_unavailable(true);
        let engine = RecommendationEngine::new(provider);

        let err = engine.generate("u1", &[], 10).await.unwrap_err();
        assert!(matches!(err, EngineError::Provider(_)));
    }
}
