use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use readiness_core::service::PredictionService;

#[derive(Debug, Parser)]
#[command(name = "readiness_worker")]
struct Args {
    /// Player to score. Repeat to score several players.
    #[arg(long = "player-id", required = true)]
    player_ids: Vec<i64>,

    /// Target match. Omit to score the player's next match.
    #[arg(long)]
    match_id: Option<i64>,

    /// Score without reading or writing the prediction cache.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = readiness_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let service = PredictionService::from_settings(&settings).await?;
    if !args.dry_run && !service.cache().is_available() {
        tracing::warn!("prediction cache unavailable; results will not be warmed");
    }

    let mut failed = 0usize;
    for &player_id in &args.player_ids {
        let res = if args.dry_run {
            service.score_uncached(player_id, args.match_id).await
        } else {
            service.predict(player_id, args.match_id).await
        };

        match res {
            Ok(prediction) => {
                println!("{}", serde_json::to_string(&prediction)?);
            }
            Err(err) => {
                failed += 1;
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(
                    player_id,
                    match_id = ?args.match_id,
                    error = %err,
                    "prediction failed"
                );
            }
        }
    }

    tracing::info!(
        players = args.player_ids.len(),
        failed,
        dry_run = args.dry_run,
        "worker run finished"
    );
    anyhow::ensure!(failed == 0, "{failed} prediction(s) failed");
    Ok(())
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
