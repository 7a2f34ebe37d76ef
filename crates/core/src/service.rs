use crate::cache::{cache_key, ResultCache, PREDICTION_TTL_SECS};
use crate::config::Settings;
use crate::domain::features::FeatureRecord;
use crate::domain::prediction::PredictionResponse;
use crate::features::FeatureProvider;
use crate::scoring::ScoringEngine;
use std::sync::Arc;

/// Cache-aside orchestration: probe, fetch features, score, store, respond.
///
/// Concurrent identical requests may both miss and both compute; scoring is
/// cheap and deterministic on the heuristic path, so no de-duplication is done.
#[derive(Clone)]
pub struct PredictionService {
    features: Arc<dyn FeatureProvider>,
    engine: ScoringEngine,
    cache: ResultCache,
}

impl PredictionService {
    pub fn new(
        features: Arc<dyn FeatureProvider>,
        engine: ScoringEngine,
        cache: ResultCache,
    ) -> Self {
        Self {
            features,
            engine,
            cache,
        }
    }

    /// Wires every collaborator from the environment. Only the feature source
    /// can fail here; the model and the cache degrade instead.
    pub async fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let features = crate::features::from_settings(settings).await?;
        let model = crate::model::load(settings).await;
        let engine = ScoringEngine::new(model, settings.model_timeout());
        let cache = ResultCache::from_settings(settings).await;

        tracing::info!(
            feature_source = features.source_name(),
            model = engine.has_model(),
            cache = cache.is_available(),
            "prediction service ready"
        );

        Ok(Self::new(features, engine, cache))
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Full request path. Features are only fetched on a cache miss.
    pub async fn predict(
        &self,
        player_id: i64,
        match_id: Option<i64>,
    ) -> anyhow::Result<PredictionResponse> {
        let key = cache_key(player_id, match_id);
        if let Some(cached) = self.cached(&key).await {
            return Ok(cached);
        }

        let features = self.features.get_features(player_id, match_id).await?;
        Ok(self.score_and_store(&key, player_id, match_id, &features).await)
    }

    /// Cache-aside scoring for an already assembled feature record. Never fails.
    pub async fn compute_prediction(
        &self,
        player_id: i64,
        match_id: Option<i64>,
        features: &FeatureRecord,
    ) -> PredictionResponse {
        let key = cache_key(player_id, match_id);
        if let Some(cached) = self.cached(&key).await {
            return cached;
        }
        self.score_and_store(&key, player_id, match_id, features).await
    }

    /// Scores without consulting or filling the cache.
    pub async fn score_uncached(
        &self,
        player_id: i64,
        match_id: Option<i64>,
    ) -> anyhow::Result<PredictionResponse> {
        let features = self.features.get_features(player_id, match_id).await?;
        let outcome = self.engine.score(&features).await;
        Ok(PredictionResponse::from_outcome(player_id, match_id, &outcome))
    }

    async fn cached(&self, key: &str) -> Option<PredictionResponse> {
        let raw = self.cache.get(key).await?;
        match serde_json::from_str::<PredictionResponse>(&raw) {
            Ok(res) => {
                tracing::info!(key, "returning cached prediction");
                Some(res)
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "cached prediction unreadable; recomputing");
                None
            }
        }
    }

    async fn score_and_store(
        &self,
        key: &str,
        player_id: i64,
        match_id: Option<i64>,
        features: &FeatureRecord,
    ) -> PredictionResponse {
        let outcome = self.engine.score(features).await;
        let response = PredictionResponse::from_outcome(player_id, match_id, &outcome);

        match serde_json::to_string(&response) {
            Ok(raw) => self.cache.put(key, &raw, PREDICTION_TTL_SECS).await,
            Err(e) => tracing::warn!(key, error = %e, "failed to serialize prediction for cache"),
        }

        response
    }
}
