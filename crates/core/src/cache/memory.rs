use crate::cache::PredictionStore;
use dashmap::DashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process store with per-entry expiry. Expired entries are dropped on read,
/// and writes sweep the whole map at most once per sweep interval.
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    sweep_interval: Duration,
    last_sweep: Mutex<Instant>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_sweep_interval(DEFAULT_SWEEP_INTERVAL)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sweep_interval(sweep_interval: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            sweep_interval,
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    fn sweep_expired(&self, now: Instant) {
        // A contended or poisoned lock means another writer is sweeping.
        let Ok(mut last) = self.last_sweep.try_lock() else {
            return;
        };
        if now.duration_since(*last) < self.sweep_interval {
            return;
        }
        *last = now;
        drop(last);

        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(
                removed,
                remaining = self.entries.len(),
                "swept expired cache entries"
            );
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait::async_trait]
impl PredictionStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.value.clone()));
            }
        }
        // Guard must be dropped before removing from the same shard.
        self.entries.remove_if(key, |_, e| e.expires_at <= now);
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<()> {
        let now = Instant::now();
        self.sweep_expired(now);
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + Duration::from_secs(ttl_secs),
            },
        );
        Ok(())
    }
}
