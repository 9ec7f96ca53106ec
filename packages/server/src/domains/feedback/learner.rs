//! Preference learning from feedback events.
//!
//! Aggregates a user's clicks/saves/dismissals into per-key preference
//! weights (keys span content types, difficulties, and technologies) and
//! applies them as a bounded multiplier during re-ranking. The aggregate
//! is cached for a week and recomputed on miss; feedback writes
//! invalidate it.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::entity_ids::UserId;
use crate::common::errors::AppResult;
use crate::domains::content::models::bookmark::ContentWithAnalysis;
use crate::domains::feedback::models::feedback::{FeedbackEvent, NewFeedback};
use crate::domains::recommend::engines::candidate_technologies;
use crate::domains::recommend::types::ScoredCandidate;
use crate::kernel::cache::{self, cache_get_json, cache_set_json, CacheStore};
use crate::kernel::traits::{BaseFeedbackStore, BaseRecommendationStore};

/// Negative events count at half strength.
const NEGATIVE_WEIGHT: f32 = 0.5;

/// Interactions needed before a key's confidence saturates.
const CONFIDENCE_SATURATION: u32 = 5;

/// The personalization multiplier is bounded to ±20%.
const MAX_BOOST: f32 = 0.20;

/// Dampens each key's contribution so one shared key (everything the
/// user saves tends to share a technology) can't saturate the cap on
/// its own.
const PER_KEY_SCALE: f32 = 0.1;

/// Preference strength for one key.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PreferenceWeight {
    /// (positive − 0.5·negative) / (total + 1), in (−1, 1)
    pub weight: f32,
    /// total / 5, capped at 1
    pub confidence: f32,
    pub total: u32,
}

/// A user's aggregated preferences, keyed `kind:value`
/// ("content_type:tutorial", "difficulty:beginner", "tech:python").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreferenceProfile {
    pub weights: HashMap<String, PreferenceWeight>,
    pub event_count: usize,
}

impl PreferenceProfile {
    /// Aggregate events against what is known about the content they
    /// targeted. Events for deleted/unknown content are skipped.
    pub fn from_events(
        events: &[FeedbackEvent],
        content_by_id: &HashMap<uuid::Uuid, ContentWithAnalysis>,
    ) -> Self {
        let mut positives: HashMap<String, u32> = HashMap::new();
        let mut negatives: HashMap<String, u32> = HashMap::new();

        let mut counted = 0usize;
        for event in events {
            let Some(feedback_type) = event.feedback_type() else {
                continue;
            };
            let Some(content) = content_by_id.get(&event.content_id) else {
                continue;
            };
            counted += 1;

            let bucket = if feedback_type.is_positive() {
                &mut positives
            } else {
                &mut negatives
            };
            for key in Self::keys_for(content) {
                *bucket.entry(key).or_default() += 1;
            }
        }

        let mut weights = HashMap::new();
        let all_keys: std::collections::HashSet<String> = positives
            .keys()
            .chain(negatives.keys())
            .cloned()
            .collect();

        for key in all_keys {
            let pos = *positives.get(&key).unwrap_or(&0);
            let neg = *negatives.get(&key).unwrap_or(&0);
            let total = pos + neg;
            weights.insert(
                key,
                PreferenceWeight {
                    weight: (pos as f32 - NEGATIVE_WEIGHT * neg as f32) / (total as f32 + 1.0),
                    confidence: (total as f32 / CONFIDENCE_SATURATION as f32).min(1.0),
                    total,
                },
            );
        }

        Self {
            weights,
            event_count: counted,
        }
    }

    fn keys_for(content: &ContentWithAnalysis) -> Vec<String> {
        let mut keys = Vec::new();
        if let Some(content_type) = &content.content_type {
            keys.push(format!("content_type:{}", content_type));
        }
        if let Some(difficulty) = &content.difficulty_level {
            keys.push(format!("difficulty:{}", difficulty));
        }
        for tech in candidate_technologies(content) {
            keys.push(format!("tech:{}", tech));
        }
        keys
    }

    /// Bounded multiplier for one candidate: 1 + Σ(weight · confidence)
    /// over matching keys, clamped to ±20%.
    pub fn multiplier_for(&self, content: &ContentWithAnalysis) -> f32 {
        let boost: f32 = Self::keys_for(content)
            .iter()
            .filter_map(|key| self.weights.get(key))
            .map(|w| w.weight * w.confidence * PER_KEY_SCALE)
            .sum();
        1.0 + boost.clamp(-MAX_BOOST, MAX_BOOST)
    }
}

/// The learner service: records events, serves cached profiles, and
/// personalizes scored candidates.
pub struct FeedbackLearner {
    feedback: Arc<dyn BaseFeedbackStore>,
    content: Arc<dyn BaseRecommendationStore>,
    cache: Arc<dyn CacheStore>,
}

impl FeedbackLearner {
    /// How much of a user's library is considered when attributing events.
    const CONTENT_SCAN_CAP: i64 = 1_000;

    pub fn new(
        feedback: Arc<dyn BaseFeedbackStore>,
        content: Arc<dyn BaseRecommendationStore>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            feedback,
            content,
            cache,
        }
    }

    /// Append one event and drop the cached profile.
    pub async fn record_feedback(&self, event: &NewFeedback) -> AppResult<FeedbackEvent> {
        let stored = self.feedback.record(event).await?;
        let _ = self
            .cache
            .delete(&cache::keys::preferences(event.user_id))
            .await;
        Ok(stored)
    }

    /// The user's preference profile, cached for a week.
    pub async fn get_preferences(&self, user: UserId) -> AppResult<PreferenceProfile> {
        let key = cache::keys::preferences(user);
        if let Some(profile) = cache_get_json::<PreferenceProfile>(self.cache.as_ref(), &key).await
        {
            return Ok(profile);
        }

        let events = self.feedback.list_for_user(user, None).await?;
        let contents = self
            .content
            .ordered_content_for_user(user, Self::CONTENT_SCAN_CAP)
            .await?;
        let by_id: HashMap<uuid::Uuid, ContentWithAnalysis> = contents
            .into_iter()
            .map(|c| (c.content.id, c))
            .collect();

        let profile = PreferenceProfile::from_events(&events, &by_id);
        debug!(user = %user, keys = profile.weights.len(), events = profile.event_count, "preference profile rebuilt");

        cache_set_json(
            self.cache.as_ref(),
            &key,
            &profile,
            Some(cache::keys::TTL_PREFERENCES),
        )
        .await;
        Ok(profile)
    }

    /// Re-rank scored candidates by the user's preferences. Scores stay
    /// within [0, 100]; ordering is re-derived after the boost.
    pub async fn personalize(
        &self,
        user: UserId,
        mut scored: Vec<ScoredCandidate>,
    ) -> AppResult<Vec<ScoredCandidate>> {
        let profile = self.get_preferences(user).await?;
        if profile.weights.is_empty() {
            return Ok(scored);
        }

        for candidate in &mut scored {
            candidate.score =
                (candidate.score * profile.multiplier_for(&candidate.content)).clamp(0.0, 100.0);
        }
        crate::domains::recommend::engines::sort_scored(&mut scored);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::feedback::models::feedback::FeedbackType;
    use crate::kernel::test_dependencies::{make_candidate, with_analysis};
    use chrono::Utc;
    use uuid::Uuid;

    fn event(user: Uuid, content: Uuid, feedback_type: FeedbackType) -> FeedbackEvent {
        FeedbackEvent {
            id: Uuid::new_v4(),
            user_id: user,
            content_id: content,
            recommendation_id: None,
            feedback_type: feedback_type.as_str().to_string(),
            context_data: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn positive_events_build_positive_weights() {
        let user = Uuid::new_v4();
        let tutorial = with_analysis(
            make_candidate(user, "https://a", "A", 5, None),
            "tutorial",
            "beginner",
            &["python"],
            50,
        );
        let id = tutorial.content.id;
        let by_id = HashMap::from([(id, tutorial)]);

        let events: Vec<_> = (0..5).map(|_| event(user, id, FeedbackType::Clicked)).collect();
        let profile = PreferenceProfile::from_events(&events, &by_id);

        let weight = profile.weights.get("content_type:tutorial").unwrap();
        assert!(weight.weight > 0.0);
        assert_eq!(weight.confidence, 1.0);
        assert_eq!(weight.total, 5);
    }

    #[test]
    fn negative_events_suppress() {
        let user = Uuid::new_v4();
        let article = with_analysis(
            make_candidate(user, "https://a", "A", 5, None),
            "article",
            "advanced",
            &[],
            50,
        );
        let id = article.content.id;
        let by_id = HashMap::from([(id, article.clone())]);

        let events: Vec<_> = (0..4)
            .map(|_| event(user, id, FeedbackType::Dismissed))
            .collect();
        let profile = PreferenceProfile::from_events(&events, &by_id);

        assert!(profile.weights.get("content_type:article").unwrap().weight < 0.0);
        assert!(profile.multiplier_for(&article) < 1.0);
    }

    #[test]
    fn confidence_grows_with_interactions() {
        let user = Uuid::new_v4();
        let guide = with_analysis(
            make_candidate(user, "https://a", "A", 5, None),
            "guide",
            "beginner",
            &[],
            50,
        );
        let id = guide.content.id;
        let by_id = HashMap::from([(id, guide)]);

        let one = PreferenceProfile::from_events(&[event(user, id, FeedbackType::Saved)], &by_id);
        let five = PreferenceProfile::from_events(
            &(0..5).map(|_| event(user, id, FeedbackType::Saved)).collect::<Vec<_>>(),
            &by_id,
        );

        let c1 = one.weights.get("content_type:guide").unwrap().confidence;
        let c5 = five.weights.get("content_type:guide").unwrap().confidence;
        assert!(c1 < c5);
        assert_eq!(c5, 1.0);
    }

    #[test]
    fn multiplier_is_capped_at_twenty_percent() {
        let user = Uuid::new_v4();
        let candidate = with_analysis(
            make_candidate(user, "https://a", "A", 5, None),
            "tutorial",
            "beginner",
            &["python", "flask", "sqlalchemy"],
            50,
        );
        let id = candidate.content.id;
        let by_id = HashMap::from([(id, candidate.clone())]);

        // Many positive events across many keys
        let events: Vec<_> = (0..40).map(|_| event(user, id, FeedbackType::Helpful)).collect();
        let profile = PreferenceProfile::from_events(&events, &by_id);

        let multiplier = profile.multiplier_for(&candidate);
        assert!(multiplier <= 1.0 + MAX_BOOST + 1e-6);
    }

    #[test]
    fn events_for_unknown_content_are_ignored() {
        let user = Uuid::new_v4();
        let events = vec![event(user, Uuid::new_v4(), FeedbackType::Clicked)];
        let profile = PreferenceProfile::from_events(&events, &HashMap::new());
        assert!(profile.weights.is_empty());
        assert_eq!(profile.event_count, 0);
    }
}
