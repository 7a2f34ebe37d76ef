pub mod cache;
pub mod domain;
pub mod error;
pub mod features;
pub mod model;
pub mod scoring;
pub mod service;

pub mod config {
    use anyhow::Context;

    const DEFAULT_REDIS_URL: &str = "redis://redis:6379/0";
    const DEFAULT_MODEL_TIMEOUT_MS: u64 = 2000;
    const DEFAULT_FEATURE_WINDOW: i64 = 5;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum CacheBackend {
        Redis,
        Memory,
        Disabled,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FeatureSource {
        Stub,
        Warehouse,
    }

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub redis_url: String,
        pub cache_backend: CacheBackend,
        pub model_uri: Option<String>,
        pub model_serving_url: Option<String>,
        pub model_timeout_ms: u64,
        pub feature_source: FeatureSource,
        pub feature_window: i64,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let cache_backend = match std::env::var("CACHE_BACKEND") {
                Ok(v) => parse_cache_backend(&v)?,
                Err(_) => CacheBackend::Redis,
            };
            let feature_source = match std::env::var("FEATURE_SOURCE") {
                Ok(v) => parse_feature_source(&v)?,
                Err(_) => FeatureSource::Stub,
            };

            let model_timeout_ms = std::env::var("MODEL_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(DEFAULT_MODEL_TIMEOUT_MS);

            let feature_window = std::env::var("FEATURE_WINDOW")
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .unwrap_or(DEFAULT_FEATURE_WINDOW);
            anyhow::ensure!(
                feature_window >= 1,
                "FEATURE_WINDOW must be >= 1 (got {feature_window})"
            );

            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                redis_url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string()),
                cache_backend,
                model_uri: non_empty_var("MLFLOW_MODEL_URI"),
                model_serving_url: non_empty_var("MODEL_SERVING_URL"),
                model_timeout_ms,
                feature_source,
                feature_window,
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn model_timeout(&self) -> std::time::Duration {
            std::time::Duration::from_millis(self.model_timeout_ms)
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn parse_cache_backend(s: &str) -> anyhow::Result<CacheBackend> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(CacheBackend::Redis),
            "memory" => Ok(CacheBackend::Memory),
            "none" | "off" | "disabled" => Ok(CacheBackend::Disabled),
            other => anyhow::bail!("unknown CACHE_BACKEND: {other}"),
        }
    }

    fn parse_feature_source(s: &str) -> anyhow::Result<FeatureSource> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stub" => Ok(FeatureSource::Stub),
            "warehouse" => Ok(FeatureSource::Warehouse),
            other => anyhow::bail!("unknown FEATURE_SOURCE: {other}"),
        }
    }

}
