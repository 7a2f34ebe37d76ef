use serde::{Deserialize, Serialize};

/// `model` value reported when the heuristic produced the score.
pub const HEURISTIC_MODEL_ID: &str = "demo-fallback";

pub const MIN_READINESS: f64 = 1.0;
pub const MAX_READINESS: f64 = 10.0;

pub fn clamp_readiness(score: f64) -> f64 {
    score.clamp(MIN_READINESS, MAX_READINESS)
}

/// Which scoring path produced a readiness score.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome {
    ModelScored { score: f64, model: String },
    HeuristicScored { score: f64 },
}

impl ScoreOutcome {
    pub fn score(&self) -> f64 {
        match self {
            Self::ModelScored { score, .. } | Self::HeuristicScored { score } => *score,
        }
    }

    pub fn model_id(&self) -> &str {
        match self {
            Self::ModelScored { model, .. } => model,
            Self::HeuristicScored { .. } => HEURISTIC_MODEL_ID,
        }
    }

    pub fn is_model_scored(&self) -> bool {
        matches!(self, Self::ModelScored { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub player_id: i64,
    pub match_id: Option<i64>,
    pub predicted_readiness: f64,
    pub model: String,
}

impl PredictionResponse {
    pub fn from_outcome(player_id: i64, match_id: Option<i64>, outcome: &ScoreOutcome) -> Self {
        Self {
            player_id,
            match_id,
            predicted_readiness: round2(outcome.score()),
            model: outcome.model_id().to_string(),
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
