use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const RECENT_GOALS: &str = "recent_goals";
pub const RECENT_XG: &str = "recent_xg";
pub const AVG_DISTANCE_KM: &str = "avg_distance_km";
pub const SPRINT_COUNT_AVG: &str = "sprint_count_avg";
pub const JDAY_PATTERN: &str = "jday_pattern";

/// Scalar metrics that are expected to be non-negative numbers.
pub const NUMERIC_KEYS: [&str; 4] = [RECENT_GOALS, RECENT_XG, AVG_DISTANCE_KM, SPRINT_COUNT_AVG];

/// Named metrics describing a player's recent activity.
///
/// Values are kept as raw JSON so that the record can be handed to a model
/// unchanged; scalar reads go through [`FeatureRecord::metric`], which treats
/// missing and non-numeric values as `0.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureRecord(BTreeMap<String, Value>);

impl FeatureRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Strict read: `Ok(None)` when absent, an error when present but not a finite number.
    pub fn try_metric(&self, key: &str) -> Result<Option<f64>, CoreError> {
        let Some(v) = self.0.get(key) else {
            return Ok(None);
        };
        match v.as_f64() {
            Some(n) if n.is_finite() => Ok(Some(n)),
            _ => Err(CoreError::feature(key, format!("expected a number, got {v}"))),
        }
    }

    /// Lenient read used by the heuristic. Problems are surfaced by [`FeatureRecord::validate`].
    pub fn metric(&self, key: &str) -> f64 {
        self.try_metric(key).ok().flatten().unwrap_or(0.0)
    }

    /// Reports problems with the expected scalar metrics without rejecting the record.
    pub fn validate(&self) -> Vec<CoreError> {
        let mut out = Vec::new();
        for key in NUMERIC_KEYS {
            match self.try_metric(key) {
                Ok(Some(v)) if v < 0.0 => {
                    out.push(CoreError::feature(key, format!("negative value {v}")));
                }
                Ok(_) => {}
                Err(err) => out.push(err),
            }
        }
        out
    }
}

impl From<BTreeMap<String, Value>> for FeatureRecord {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}
