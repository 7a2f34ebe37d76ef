pub mod mlflow;

use crate::config::Settings;
use crate::error::CoreError;
use serde::Deserialize;
use std::sync::Arc;

/// Raw inference output: either a bare score or a batch whose first row is ours.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ModelOutput {
    Scalar(f64),
    Sequence(Vec<f64>),
}

impl ModelOutput {
    pub fn first(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::Sequence(v) => v.first().copied(),
        }
    }
}

#[async_trait::async_trait]
pub trait ReadinessModel: Send + Sync {
    /// Identifier reported in responses scored by this model.
    fn model_id(&self) -> &str;

    async fn infer(&self, input: &serde_json::Value) -> anyhow::Result<ModelOutput>;
}

/// Loads the model handle once at start-up. Any failure leaves the process
/// without a model; scoring then uses the heuristic for its whole lifetime.
pub async fn load(settings: &Settings) -> Option<Arc<dyn ReadinessModel>> {
    if settings.model_serving_url.is_none() {
        tracing::info!("MODEL_SERVING_URL not set; scoring with heuristic only");
        return None;
    }

    let client = match mlflow::MlflowServingClient::from_settings(settings) {
        Ok(c) => c,
        Err(e) => {
            let err = CoreError::model("load", format!("{e:#}"));
            tracing::warn!(error = %err, "failed to build model client");
            return None;
        }
    };

    match client.ping().await {
        Ok(()) => {
            tracing::info!(model = client.model_id(), "model loaded");
            Some(Arc::new(client))
        }
        Err(e) => {
            let err = CoreError::model("load", format!("{e:#}"));
            tracing::warn!(error = %err, "model not available");
            None
        }
    }
}
