use std::sync::Arc;

use candlebot::broker::{BrokerGateway, RestBroker};
use candlebot::notifier::{LogNotifier, Notifier, TelegramNotifier};
use candlebot::predictor::RestPredictor;
use candlebot::scheduler::Scheduler;
use candlebot::{Config, Result};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    tracing::info!("🚀 Candlebot starting");

    let config = Config::from_env();
    tracing::info!("\n📊 Configuration:");
    tracing::info!("  Symbol: {}", config.symbol);
    tracing::info!("  Interval: {} min ({})", config.interval_minutes, config.timeframe.as_str());
    tracing::info!("  Volume: {} lots", config.volume);
    tracing::info!("  Sanity band: ±{:.0}%", config.sanity_band * 100.0);
    tracing::info!("  TP grace: {:?}, margin: {} points", config.tp_grace, config.tp_margin_points);
    tracing::info!("  Broker bridge: {}", config.broker_url);
    tracing::info!("  Model server: {}", config.predictor_url);

    let gateway = Arc::new(RestBroker::new(&config.broker_url));
    if !gateway.is_alive().await {
        return Err(format!(
            "Broker terminal is not reachable at {}. Is the bridge running?",
            config.broker_url
        )
        .into());
    }
    tracing::info!("✓ Broker terminal session is live");
    // No reconciliation of positions left over from a previous run: anything
    // still open at the broker is the operator's to resolve.

    let predictor = Arc::new(RestPredictor::new(&config.predictor_url));

    let notifier: Arc<dyn Notifier> = match (&config.telegram_token, &config.telegram_chat_id) {
        (Some(token), Some(chat_id)) => {
            tracing::info!("✓ Telegram notifications enabled");
            Arc::new(TelegramNotifier::new(token.clone(), chat_id.clone()))
        }
        _ => {
            tracing::warn!("Telegram not configured, notifications go to the log");
            Arc::new(LogNotifier)
        }
    };

    let scheduler = Scheduler::new(gateway, predictor, notifier, config);
    let scheduler_task = tokio::spawn(async move { scheduler.run().await });

    tracing::info!("Press Ctrl+C to stop...\n");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("\n⚠️  Received Ctrl+C, shutting down...");
        }
        result = scheduler_task => {
            tracing::error!("Scheduler exited unexpectedly: {:?}", result);
        }
    }

    tracing::info!("👋 Candlebot stopped");
    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter("candlebot=info,candlebot::execution=debug")
        .init();
}
