//! Cache-aside storage for prediction responses.
//!
//! [`ResultCache`] is advisory: when the store is missing, unreachable at
//! start-up, or failing on a call, lookups are misses and writes are dropped.

pub mod memory;
pub mod redis_store;

use crate::config::{CacheBackend, Settings};
use crate::error::CoreError;
use std::sync::Arc;
use std::time::Duration;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

/// Lifetime of every cached prediction.
pub const PREDICTION_TTL_SECS: u64 = 300;

/// Stands in for the match id when none was requested. Never parses as an integer.
pub const NEXT_MATCH_SENTINEL: &str = "next";

// Bounds each store round trip so a wedged connection degrades to a miss.
pub(crate) const STORE_OP_TIMEOUT: Duration = Duration::from_millis(500);

pub fn cache_key(player_id: i64, match_id: Option<i64>) -> String {
    match match_id {
        Some(m) => format!("pred:player:{player_id}:match:{m}"),
        None => format!("pred:player:{player_id}:match:{NEXT_MATCH_SENTINEL}"),
    }
}

#[async_trait::async_trait]
pub trait PredictionStore: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> anyhow::Result<()>;

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<()>;
}

#[derive(Clone, Default)]
pub struct ResultCache {
    store: Option<Arc<dyn PredictionStore>>,
}

impl ResultCache {
    pub fn disabled() -> Self {
        Self { store: None }
    }

    /// Probes the store once. A failed probe disables the cache for good; there is no reconnect.
    pub async fn connect(store: Arc<dyn PredictionStore>) -> Self {
        let backend = store.backend();
        let probe = match tokio::time::timeout(STORE_OP_TIMEOUT, store.ping()).await {
            Ok(res) => res,
            Err(_) => Err(anyhow::anyhow!("ping timed out")),
        };

        match probe {
            Ok(()) => {
                tracing::info!(backend, "prediction cache connected");
                Self { store: Some(store) }
            }
            Err(e) => {
                let err = CoreError::cache("ping", format!("{e:#}"));
                tracing::warn!(backend, error = %err, "prediction cache disabled");
                Self::disabled()
            }
        }
    }

    pub async fn from_settings(settings: &Settings) -> Self {
        match settings.cache_backend {
            CacheBackend::Disabled => {
                tracing::info!("prediction cache disabled by configuration");
                Self::disabled()
            }
            CacheBackend::Memory => Self::connect(Arc::new(MemoryStore::new())).await,
            CacheBackend::Redis => match RedisStore::connect(&settings.redis_url).await {
                Ok(store) => Self::connect(Arc::new(store)).await,
                Err(e) => {
                    let err = CoreError::cache("connect", format!("{e:#}"));
                    tracing::warn!(backend = "redis", error = %err, "prediction cache disabled");
                    Self::disabled()
                }
            },
        }
    }

    pub fn is_available(&self) -> bool {
        self.store.is_some()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let store = self.store.as_ref()?;
        let res = match tokio::time::timeout(STORE_OP_TIMEOUT, store.get(key)).await {
            Ok(res) => res,
            Err(_) => Err(anyhow::anyhow!("get timed out")),
        };

        match res {
            Ok(Some(v)) => {
                tracing::debug!(key, backend = store.backend(), "cache hit");
                Some(v)
            }
            Ok(None) => {
                tracing::debug!(key, backend = store.backend(), "cache miss");
                None
            }
            Err(e) => {
                let err = CoreError::cache("get", format!("{e:#}"));
                tracing::warn!(key, error = %err, "cache lookup failed; treating as miss");
                None
            }
        }
    }

    pub async fn put(&self, key: &str, value: &str, ttl_secs: u64) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let write = store.set_ex(key, value, ttl_secs);
        let res = match tokio::time::timeout(STORE_OP_TIMEOUT, write).await {
            Ok(res) => res,
            Err(_) => Err(anyhow::anyhow!("set timed out")),
        };

        match res {
            Ok(()) => tracing::debug!(key, ttl_secs, backend = store.backend(), "cached"),
            Err(e) => {
                let err = CoreError::cache("set", format!("{e:#}"));
                tracing::warn!(key, error = %err, "failed to cache prediction");
            }
        }
    }
}
