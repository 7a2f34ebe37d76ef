use crate::config::Settings;
use crate::domain::features::{FeatureRecord, JDAY_PATTERN, RECENT_GOALS, RECENT_XG};
use crate::features::FeatureProvider;
use anyhow::Context;
use chrono::NaiveDate;

/// One played match in the player's recent history.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRow {
    pub match_id: i32,
    pub match_date: NaiveDate,
    pub goals: f64,
    pub xg: f64,
}

/// Builds feature records from `fact_player_wyscout` and `dim_match`.
///
/// The warehouse has no GPS facts, so `avg_distance_km` and `sprint_count_avg`
/// are left out of the record and read as 0 by the heuristic.
#[derive(Debug, Clone)]
pub struct WarehouseFeatureProvider {
    pool: sqlx::PgPool,
    window: i64,
}

impl WarehouseFeatureProvider {
    pub async fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let db_url = settings.require_database_url()?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
            .context("connect DATABASE_URL failed")?;
        Ok(Self::new(pool, settings.feature_window))
    }

    pub fn new(pool: sqlx::PgPool, window: i64) -> Self {
        Self { pool, window }
    }

    async fn recent_matches(
        &self,
        player_id: i64,
        match_id: Option<i64>,
    ) -> anyhow::Result<Vec<MatchRow>> {
        // When a target match is given, only matches played before it count.
        let rows = sqlx::query_as::<_, (i32, NaiveDate, f64, f64)>(
            "SELECT w.match_id, m.match_date, \
                    COALESCE(w.goals, 0)::float8, COALESCE(w.xg, 0)::float8 \
             FROM fact_player_wyscout w \
             JOIN dim_match m ON m.match_id = w.match_id \
             WHERE w.player_id = $1::int8 \
               AND ($2::int8 IS NULL OR m.match_date < \
                    (SELECT t.match_date FROM dim_match t WHERE t.match_id = $2::int8)) \
             ORDER BY m.match_date DESC \
             LIMIT $3::int8",
        )
        .persistent(false)
        .bind(player_id)
        .bind(match_id)
        .bind(self.window)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("query recent matches failed (player_id={player_id})"))?;

        Ok(rows
            .into_iter()
            .map(|(match_id, match_date, goals, xg)| MatchRow {
                match_id,
                match_date,
                goals,
                xg,
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl FeatureProvider for WarehouseFeatureProvider {
    fn source_name(&self) -> &'static str {
        "warehouse"
    }

    async fn get_features(
        &self,
        player_id: i64,
        match_id: Option<i64>,
    ) -> anyhow::Result<FeatureRecord> {
        let t0 = std::time::Instant::now();
        let rows = self.recent_matches(player_id, match_id).await?;
        tracing::debug!(
            player_id,
            ?match_id,
            matches = rows.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "loaded warehouse features"
        );
        if missing_target_history(match_id, &rows) {
            // Also what an unknown match id looks like: the date subquery yields NULL.
            tracing::warn!(
                player_id,
                ?match_id,
                "no match history before target match; features default to zero"
            );
        }
        Ok(aggregate(&rows))
    }
}

pub fn missing_target_history(match_id: Option<i64>, rows: &[MatchRow]) -> bool {
    match_id.is_some() && rows.is_empty()
}

/// Sums goals and xG and records the day gaps between consecutive matches.
/// `rows` must be most recent first.
pub fn aggregate(rows: &[MatchRow]) -> FeatureRecord {
    let goals: f64 = rows.iter().map(|r| r.goals).sum();
    let xg: f64 = rows.iter().map(|r| r.xg).sum();

    let mut rec = FeatureRecord::new()
        .with(RECENT_GOALS, goals)
        .with(RECENT_XG, xg);

    let gaps: Vec<i64> = rows
        .windows(2)
        .map(|w| (w[0].match_date - w[1].match_date).num_days())
        .collect();
    rec.insert(JDAY_PATTERN, gaps);

    rec
}
