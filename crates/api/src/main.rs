use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use readiness_core::domain::prediction::PredictionResponse;
use readiness_core::service::PredictionService;

const SERVICE_NAME: &str = "analytics-service";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = readiness_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let service = match PredictionService::from_settings(&settings).await {
        Ok(svc) => Some(Arc::new(svc)),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(
                error = %e,
                "feature source unavailable; starting API in degraded mode"
            );
            None
        }
    };

    let app = router(AppState { service });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/predict/player/:player_id", get(predict_player))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[derive(Clone)]
struct AppState {
    service: Option<Arc<PredictionService>>,
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    service: &'static str,
}

async fn healthz() -> Json<Health> {
    Json(Health {
        status: "ok",
        service: SERVICE_NAME,
    })
}

#[derive(Debug, Deserialize)]
struct PredictQuery {
    next_match_id: Option<i64>,
}

async fn predict_player(
    State(state): State<AppState>,
    Path(player_id): Path<i64>,
    Query(query): Query<PredictQuery>,
    headers: HeaderMap,
) -> Result<Json<PredictionResponse>, StatusCode> {
    require_bearer(&headers)?;

    let Some(service) = &state.service else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let res = service
        .predict(player_id, query.next_match_id)
        .await
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(player_id, error = %e, "prediction failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(res))
}

// Presence check only. The credential is never decoded or verified here.
fn require_bearer(headers: &HeaderMap) -> Result<(), StatusCode> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let (scheme, token) = value.split_once(' ').ok_or(StatusCode::UNAUTHORIZED)?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &readiness_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use readiness_core::cache::{MemoryStore, ResultCache};
    use readiness_core::domain::features::FeatureRecord;
    use readiness_core::features::{FeatureProvider, StubFeatureProvider};
    use readiness_core::scoring::ScoringEngine;
    use reqwest::StatusCode as HttpStatus;
    use serde_json::{json, Value};

    struct OfflineFeatures;

    #[async_trait::async_trait]
    impl FeatureProvider for OfflineFeatures {
        fn source_name(&self) -> &'static str {
            "offline"
        }

        async fn get_features(
            &self,
            _player_id: i64,
            _match_id: Option<i64>,
        ) -> anyhow::Result<FeatureRecord> {
            anyhow::bail!("warehouse offline")
        }
    }

    async fn spawn(state: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router(state)).await;
        });
        format!("http://{addr}")
    }

    async fn stub_state() -> AppState {
        let cache = ResultCache::connect(Arc::new(MemoryStore::new())).await;
        let svc = PredictionService::new(
            Arc::new(StubFeatureProvider),
            ScoringEngine::heuristic_only(),
            cache,
        );
        AppState {
            service: Some(Arc::new(svc)),
        }
    }

    #[tokio::test]
    async fn healthz_reports_service() {
        let base = spawn(AppState { service: None }).await;
        let body: Value = reqwest::get(format!("{base}/healthz"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({"status": "ok", "service": "analytics-service"}));
    }

    #[tokio::test]
    async fn predict_returns_response_shape() {
        let base = spawn(stub_state().await).await;
        let client = reqwest::Client::new();

        let res = client
            .get(format!("{base}/predict/player/7?next_match_id=3"))
            .bearer_auth("demo")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), HttpStatus::OK);
        let body: Value = res.json().await.unwrap();
        assert_eq!(
            body,
            json!({
                "player_id": 7,
                "match_id": 3,
                "predicted_readiness": 7.1,
                "model": "demo-fallback",
            })
        );

        let body: Value = client
            .get(format!("{base}/predict/player/7"))
            .bearer_auth("demo")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["match_id"], Value::Null);
    }

    #[tokio::test]
    async fn predict_requires_bearer_credential() {
        let base = spawn(stub_state().await).await;
        let client = reqwest::Client::new();

        let res = client
            .get(format!("{base}/predict/player/7"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), HttpStatus::UNAUTHORIZED);

        let res = client
            .get(format!("{base}/predict/player/7"))
            .basic_auth("user", Some("pass"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), HttpStatus::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn feature_failure_is_server_error_and_missing_service_is_unavailable() {
        let svc = PredictionService::new(
            Arc::new(OfflineFeatures),
            ScoringEngine::heuristic_only(),
            ResultCache::disabled(),
        );
        let base = spawn(AppState {
            service: Some(Arc::new(svc)),
        })
        .await;
        let res = reqwest::Client::new()
            .get(format!("{base}/predict/player/1"))
            .bearer_auth("demo")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), HttpStatus::INTERNAL_SERVER_ERROR);

        let base = spawn(AppState { service: None }).await;
        let res = reqwest::Client::new()
            .get(format!("{base}/predict/player/1"))
            .bearer_auth("demo")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), HttpStatus::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "bearer abc".parse().unwrap());
        assert!(require_bearer(&headers).is_ok());

        headers.insert(AUTHORIZATION, "Bearer   ".parse().unwrap());
        assert_eq!(require_bearer(&headers), Err(StatusCode::UNAUTHORIZED));
    }
}
