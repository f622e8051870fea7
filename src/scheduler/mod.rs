use std::sync::Arc;
use std::time::Duration;

use chrono::{Timelike, Utc};
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};

use crate::broker::BrokerGateway;
use crate::config::Config;
use crate::execution::{ClosureReport, ClosureSupervisor, TradeController, TradeError};
use crate::notifier::Notifier;
use crate::predictor::Predictor;
use crate::Result;

/// Why a cycle ended without a completed trade
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Candle history was empty or shorter than the prediction window
    NotEnoughData,
    /// Prediction fell outside the sanity band around the current price
    PredictionOutOfBand { prediction: f64, ask: f64 },
    /// Entry was rejected or the session/symbol was unavailable
    EntryFailed,
}

/// Result of one predict-trade-close cycle
#[derive(Debug)]
pub enum CycleOutcome {
    Skipped(SkipReason),
    Traded(ClosureReport),
}

/// Whether a prediction is close enough to the current price to act on.
/// Both band edges are accepted.
pub fn within_band(prediction: f64, ask: f64, band: f64) -> bool {
    (prediction - ask).abs() <= band * ask
}

/// Instant of the next wall-clock interval boundary (XX:00, XX:15, ... for a
/// 15-minute interval)
fn next_interval_boundary(interval_minutes: u32) -> Instant {
    let now = Utc::now();
    let interval_secs = interval_minutes as i64 * 60;
    let secs_into_interval =
        (now.minute() as i64 * 60 + now.second() as i64) % interval_secs;
    let secs_until_next = interval_secs - secs_into_interval;
    Instant::now() + Duration::from_secs(secs_until_next as u64)
}

/// Drives one predict-trade-close cycle per interval, aligned to wall-clock
/// boundaries. The scheduler and the closure supervisor are serialized: the
/// cycle does not end until the supervision task has been joined, so at most
/// one trade lifecycle is ever in flight.
pub struct Scheduler {
    gateway: Arc<dyn BrokerGateway>,
    predictor: Arc<dyn Predictor>,
    notifier: Arc<dyn Notifier>,
    controller: TradeController,
    supervisor: ClosureSupervisor,
    config: Config,
}

impl Scheduler {
    pub fn new(
        gateway: Arc<dyn BrokerGateway>,
        predictor: Arc<dyn Predictor>,
        notifier: Arc<dyn Notifier>,
        config: Config,
    ) -> Self {
        let controller = TradeController::new(gateway.clone(), &config);
        let supervisor = ClosureSupervisor::new(gateway.clone(), &config);
        Self {
            gateway,
            predictor,
            notifier,
            controller,
            supervisor,
            config,
        }
    }

    /// Main loop. Never returns; cycle faults are logged and followed by a
    /// cooldown, termination happens only by external signal.
    pub async fn run(&self) {
        let interval = Duration::from_secs(self.config.interval_minutes as u64 * 60);
        let start = next_interval_boundary(self.config.interval_minutes);
        tracing::info!(
            "Scheduler starting, first cycle in {:?} at the next {}-minute boundary",
            start - Instant::now(),
            self.config.interval_minutes
        );

        let mut ticker = interval_at(start, interval);
        // A trade lifecycle can run up to the next boundary; skip ticks we
        // were too late for instead of firing twice.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            tracing::info!("🔄 Cycle tick at {}", Utc::now().format("%H:%M:%S"));

            let deadline = Instant::now() + interval;
            match self.run_cycle(deadline).await {
                Ok(CycleOutcome::Skipped(reason)) => {
                    tracing::info!("Cycle skipped: {:?}", reason);
                }
                Ok(CycleOutcome::Traded(report)) => {
                    tracing::info!(
                        "Trade lifecycle finished ({}), P&L: {}",
                        report.reason,
                        profit_label(report.profit)
                    );
                }
                Err(e) => {
                    tracing::error!("Cycle failed: {}", e);
                    sleep(self.config.error_cooldown).await;
                }
            }
        }
    }

    /// One cycle: fetch history, predict, sanity-check, enter, then wait for
    /// the closure supervisor to finish. `deadline` is the end of the current
    /// interval window.
    pub async fn run_cycle(&self, deadline: Instant) -> Result<CycleOutcome> {
        let config = &self.config;

        let closes = self
            .gateway
            .recent_closes(&config.symbol, config.timeframe, config.history_len)
            .await?;
        if closes.len() < config.window_len {
            tracing::warn!(
                "Only {} closed candles available ({} needed), skipping cycle",
                closes.len(),
                config.window_len
            );
            return Ok(CycleOutcome::Skipped(SkipReason::NotEnoughData));
        }

        let window: Vec<f64> = closes[closes.len() - config.window_len..]
            .iter()
            .map(|p| p.close)
            .collect();
        let prediction = self.predictor.predict(&window).await?;

        let quote = self.gateway.quote(&config.symbol).await?;
        tracing::info!(
            "Current price: {:.2}, predicted price: {:.2}",
            quote.ask,
            prediction
        );

        if !within_band(prediction, quote.ask, config.sanity_band) {
            tracing::warn!(
                "Prediction {:.2} outside ±{:.0}% of {:.2}, skipping trade",
                prediction,
                config.sanity_band * 100.0,
                quote.ask
            );
            return Ok(CycleOutcome::Skipped(SkipReason::PredictionOutOfBand {
                prediction,
                ask: quote.ask,
            }));
        }

        let position = match self
            .controller
            .enter(&config.symbol, prediction, config.volume)
            .await
        {
            Ok(position) => position,
            Err(e @ TradeError::OrderRejected { .. }) => {
                // Entry failures are not retried within the cycle
                tracing::error!("Failed to execute trade: {}", e);
                return Ok(CycleOutcome::Skipped(SkipReason::EntryFailed));
            }
            Err(e) => {
                tracing::error!("Entry aborted: {}", e);
                return Ok(CycleOutcome::Skipped(SkipReason::EntryFailed));
            }
        };

        self.notify(&format!(
            "Trade opened:\nSymbol: {}\nCurrent price: {:.2}\nPredicted price: {:.2}",
            config.symbol, quote.ask, prediction
        ))
        .await;

        // One supervision task per trade; join it before the next cycle so
        // two lifecycles never overlap.
        let handle = self.supervisor.spawn(position, prediction, deadline);
        let report = handle.await?;

        self.notify(&format!(
            "Trade closed ({}):\nP&L: {}",
            report.reason,
            profit_label(report.profit)
        ))
        .await;

        Ok(CycleOutcome::Traded(report))
    }

    async fn notify(&self, message: &str) {
        if let Err(e) = self.notifier.send(message).await {
            tracing::warn!("Notification failed: {}", e);
        }
    }
}

fn profit_label(profit: Option<f64>) -> String {
    match profit {
        Some(value) => format!("{:.2}", value),
        None => "unknown".to_string(),
    }
}
