use crate::config::Settings;
use crate::error::CoreError;
use crate::model::{ModelOutput, ReadinessModel};
use anyhow::Context;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_MODEL_ID: &str = "models:/player_perf_model/Production";
const INVOCATIONS_PATH: &str = "/invocations";
const PING_PATH: &str = "/ping";

/// Client for an MLflow scoring server (`mlflow models serve`).
#[derive(Debug, Clone)]
pub struct MlflowServingClient {
    http: reqwest::Client,
    base_url: String,
    model_id: String,
}

impl MlflowServingClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let base_url = settings
            .model_serving_url
            .clone()
            .context("MODEL_SERVING_URL is required")?;
        let model_id = settings
            .model_uri
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string());

        // Per-call deadlines are enforced by the scoring engine; this only caps
        // connections that never answer at all.
        let http = reqwest::Client::builder()
            .timeout(settings.model_timeout() + Duration::from_secs(1))
            .build()
            .context("failed to build model serving http client")?;

        Ok(Self {
            http,
            base_url,
            model_id,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub async fn ping(&self) -> anyhow::Result<()> {
        let res = self
            .http
            .get(self.url(PING_PATH))
            .send()
            .await
            .context("model server ping failed")?;
        let status = res.status();
        anyhow::ensure!(status.is_success(), "model server ping HTTP {status}");
        Ok(())
    }
}

#[async_trait::async_trait]
impl ReadinessModel for MlflowServingClient {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn infer(&self, input: &Value) -> anyhow::Result<ModelOutput> {
        let res = self
            .http
            .post(self.url(INVOCATIONS_PATH))
            .json(input)
            .send()
            .await
            .context("model inference request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read model response body")?;
        if !status.is_success() {
            return Err(CoreError::model("http", format!("status={status}: {text}")).into());
        }

        let raw = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("model response is not valid JSON: {text}"))?;
        parse_predictions(raw)
    }
}

/// Accepts both `{"predictions": ...}` (MLflow 2.x) and a bare payload (MLflow 1.x).
pub fn parse_predictions(raw: Value) -> anyhow::Result<ModelOutput> {
    let payload = match raw {
        Value::Object(mut obj) => obj
            .remove("predictions")
            .context("model response object has no `predictions` key")?,
        other => other,
    };
    serde_json::from_value::<ModelOutput>(payload.clone())
        .with_context(|| format!("unsupported model prediction shape: {payload}"))
}
