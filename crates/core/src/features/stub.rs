use crate::domain::features::{
    FeatureRecord, AVG_DISTANCE_KM, JDAY_PATTERN, RECENT_GOALS, RECENT_XG, SPRINT_COUNT_AVG,
};
use crate::features::FeatureProvider;
use serde_json::json;

/// Constant features for every player, for demos and local runs without a warehouse.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubFeatureProvider;

impl StubFeatureProvider {
    pub fn record() -> FeatureRecord {
        FeatureRecord::new()
            .with(RECENT_GOALS, 1)
            .with(RECENT_XG, 0.8)
            .with(AVG_DISTANCE_KM, 9.2)
            .with(SPRINT_COUNT_AVG, 6)
            .with(JDAY_PATTERN, json!([5, 3, 2, 1]))
    }
}

#[async_trait::async_trait]
impl FeatureProvider for StubFeatureProvider {
    fn source_name(&self) -> &'static str {
        "stub"
    }

    async fn get_features(
        &self,
        _player_id: i64,
        _match_id: Option<i64>,
    ) -> anyhow::Result<FeatureRecord> {
        Ok(Self::record())
    }
}
