pub mod stub;
pub mod warehouse;

use crate::config::{FeatureSource, Settings};
use crate::domain::features::FeatureRecord;
use std::sync::Arc;

pub use self::stub::StubFeatureProvider;
pub use self::warehouse::WarehouseFeatureProvider;

#[async_trait::async_trait]
pub trait FeatureProvider: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn get_features(
        &self,
        player_id: i64,
        match_id: Option<i64>,
    ) -> anyhow::Result<FeatureRecord>;
}

pub async fn from_settings(settings: &Settings) -> anyhow::Result<Arc<dyn FeatureProvider>> {
    match settings.feature_source {
        FeatureSource::Stub => Ok(Arc::new(StubFeatureProvider)),
        FeatureSource::Warehouse => {
            let provider = WarehouseFeatureProvider::from_settings(settings).await?;
            Ok(Arc::new(provider))
        }
    }
}
