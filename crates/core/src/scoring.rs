use crate::domain::features::{FeatureRecord, AVG_DISTANCE_KM, RECENT_GOALS, RECENT_XG};
use crate::domain::prediction::{clamp_readiness, ScoreOutcome};
use crate::error::CoreError;
use crate::model::ReadinessModel;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const BASE_SCORE: f64 = 5.0;
const GOALS_WEIGHT: f64 = 0.7;
const XG_WEIGHT: f64 = 0.6;
const DISTANCE_WEIGHT: f64 = 0.1;

/// Maps feature records to readiness scores.
///
/// Holds the optional model handle loaded at start-up. Scoring never fails:
/// any model problem (error, timeout, unusable output) degrades to
/// [`heuristic_score`] and is reported as [`ScoreOutcome::HeuristicScored`].
#[derive(Clone)]
pub struct ScoringEngine {
    model: Option<Arc<dyn ReadinessModel>>,
    timeout: Duration,
}

impl ScoringEngine {
    pub fn new(model: Option<Arc<dyn ReadinessModel>>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    pub fn heuristic_only() -> Self {
        Self::new(None, Duration::ZERO)
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub async fn score(&self, features: &FeatureRecord) -> ScoreOutcome {
        for problem in features.validate() {
            tracing::warn!(error = %problem, "feature input");
        }

        if let Some(model) = &self.model {
            match self.infer(model.as_ref(), features).await {
                Ok(score) => {
                    return ScoreOutcome::ModelScored {
                        score: clamp_readiness(score),
                        model: model.model_id().to_string(),
                    };
                }
                Err(err) => {
                    tracing::warn!(error = %err, "model scoring failed; using heuristic");
                }
            }
        }

        ScoreOutcome::HeuristicScored {
            score: heuristic_score(features),
        }
    }

    async fn infer(
        &self,
        model: &dyn ReadinessModel,
        features: &FeatureRecord,
    ) -> Result<f64, CoreError> {
        let input = adapt_features(features);
        let output = match tokio::time::timeout(self.timeout, model.infer(&input)).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(CoreError::model("infer", format!("{e:#}"))),
            Err(_) => {
                return Err(CoreError::model(
                    "timeout",
                    format!("no answer within {}ms", self.timeout.as_millis()),
                ))
            }
        };

        let score = output
            .first()
            .ok_or_else(|| CoreError::model("extract", "empty prediction sequence"))?;
        if !score.is_finite() {
            let detail = format!("non-finite prediction {score}");
            return Err(CoreError::model("extract", detail));
        }
        Ok(score)
    }
}

/// `5.0 + goals*0.7 + xg*0.6 + distance_km*0.1`, clamped to the readiness range.
pub fn heuristic_score(features: &FeatureRecord) -> f64 {
    let score = BASE_SCORE
        + features.metric(RECENT_GOALS) * GOALS_WEIGHT
        + features.metric(RECENT_XG) * XG_WEIGHT
        + features.metric(AVG_DISTANCE_KM) * DISTANCE_WEIGHT;
    clamp_readiness(score)
}

/// Single-row `dataframe_records` payload, the split-free input MLflow pyfunc models accept.
pub fn adapt_features(features: &FeatureRecord) -> Value {
    json!({ "dataframe_records": [features] })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::features::{JDAY_PATTERN, SPRINT_COUNT_AVG};
    use crate::domain::prediction::HEURISTIC_MODEL_ID;
    use crate::model::ModelOutput;

    struct FixedModel(ModelOutput);

    #[async_trait::async_trait]
    impl ReadinessModel for FixedModel {
        fn model_id(&self) -> &str {
            "models:/fixed/1"
        }

        async fn infer(&self, _input: &Value) -> anyhow::Result<ModelOutput> {
            Ok(self.0.clone())
        }
    }

    struct FailingModel;

    #[async_trait::async_trait]
    impl ReadinessModel for FailingModel {
        fn model_id(&self) -> &str {
            "models:/failing/1"
        }

        async fn infer(&self, _input: &Value) -> anyhow::Result<ModelOutput> {
            anyhow::bail!("inference backend exploded")
        }
    }

    struct HangingModel;

    #[async_trait::async_trait]
    impl ReadinessModel for HangingModel {
        fn model_id(&self) -> &str {
            "models:/hanging/1"
        }

        async fn infer(&self, _input: &Value) -> anyhow::Result<ModelOutput> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(ModelOutput::Scalar(9.0))
        }
    }

    fn engine_with(model: impl ReadinessModel + 'static) -> ScoringEngine {
        ScoringEngine::new(Some(Arc::new(model)), Duration::from_millis(50))
    }

    fn stub_features() -> FeatureRecord {
        FeatureRecord::new()
            .with(RECENT_GOALS, 1)
            .with(RECENT_XG, 0.8)
            .with(AVG_DISTANCE_KM, 9.2)
            .with(SPRINT_COUNT_AVG, 6)
            .with(JDAY_PATTERN, serde_json::json!([5, 3, 2, 1]))
    }

    #[test]
    fn empty_record_scores_base() {
        assert_eq!(heuristic_score(&FeatureRecord::new()), 5.0);
    }

    #[test]
    fn large_inputs_clamp_to_ten() {
        let rec = FeatureRecord::new()
            .with(RECENT_GOALS, 10)
            .with(RECENT_XG, 10)
            .with(AVG_DISTANCE_KM, 10);
        assert_eq!(heuristic_score(&rec), 10.0);
    }

    #[test]
    fn negative_goals_clamp_to_one() {
        let rec = FeatureRecord::new().with(RECENT_GOALS, -100);
        assert_eq!(heuristic_score(&rec), 1.0);
    }

    #[test]
    fn stub_features_follow_weights() {
        // 5.0 + 0.7 + 0.48 + 0.92
        let score = heuristic_score(&stub_features());
        assert!((score - 7.1).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn non_negative_inputs_stay_in_range() {
        let values = [0.0, 0.5, 1.0, 3.0, 12.5, 100.0, 1.0e6];
        for g in values {
            for xg in values {
                for d in values {
                    let rec = FeatureRecord::new()
                        .with(RECENT_GOALS, g)
                        .with(RECENT_XG, xg)
                        .with(AVG_DISTANCE_KM, d);
                    let s = heuristic_score(&rec);
                    assert!((1.0..=10.0).contains(&s), "g={g} xg={xg} d={d} -> {s}");
                }
            }
        }
    }

    #[test]
    fn adapts_to_single_row_records() {
        let input = adapt_features(&FeatureRecord::new().with(RECENT_GOALS, 2));
        assert_eq!(input, json!({"dataframe_records": [{"recent_goals": 2}]}));
    }

    #[tokio::test]
    async fn no_model_uses_heuristic() {
        let outcome = ScoringEngine::heuristic_only().score(&FeatureRecord::new()).await;
        assert_eq!(outcome, ScoreOutcome::HeuristicScored { score: 5.0 });
        assert_eq!(outcome.model_id(), HEURISTIC_MODEL_ID);
    }

    #[tokio::test]
    async fn model_scalar_and_sequence_outputs_are_used() {
        let outcome = engine_with(FixedModel(ModelOutput::Scalar(6.5)))
            .score(&stub_features())
            .await;
        assert_eq!(
            outcome,
            ScoreOutcome::ModelScored {
                score: 6.5,
                model: "models:/fixed/1".to_string()
            }
        );

        let outcome = engine_with(FixedModel(ModelOutput::Sequence(vec![8.25, 2.0])))
            .score(&stub_features())
            .await;
        assert_eq!(outcome.score(), 8.25);
        assert!(outcome.is_model_scored());
    }

    #[tokio::test]
    async fn model_scores_are_clamped() {
        let outcome = engine_with(FixedModel(ModelOutput::Scalar(42.0)))
            .score(&stub_features())
            .await;
        assert_eq!(outcome.score(), 10.0);
        assert!(outcome.is_model_scored());
    }

    #[tokio::test]
    async fn failing_model_falls_back_to_heuristic() {
        let outcome = engine_with(FailingModel).score(&stub_features()).await;
        assert!(!outcome.is_model_scored());
        assert_eq!(outcome.score(), heuristic_score(&stub_features()));
        assert_eq!(outcome.model_id(), HEURISTIC_MODEL_ID);
    }

    #[tokio::test]
    async fn unusable_model_output_falls_back_to_heuristic() {
        let empty = engine_with(FixedModel(ModelOutput::Sequence(vec![])))
            .score(&stub_features())
            .await;
        assert!(!empty.is_model_scored());

        let nan = engine_with(FixedModel(ModelOutput::Scalar(f64::NAN)))
            .score(&stub_features())
            .await;
        assert!(!nan.is_model_scored());
    }

    #[tokio::test]
    async fn hung_model_times_out_to_heuristic() {
        let outcome = engine_with(HangingModel).score(&FeatureRecord::new()).await;
        assert_eq!(outcome, ScoreOutcome::HeuristicScored { score: 5.0 });
    }
}
