use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::time::Instant;

use candlebot::broker::{BrokerGateway, OrderRequest, OrderResult, PositionSnapshot, RETCODE_DONE};
use candlebot::execution::ClosureReason;
use candlebot::models::{Deal, OrderSide, PricePoint, Quote, SymbolInfo, Timeframe};
use candlebot::notifier::Notifier;
use candlebot::predictor::Predictor;
use candlebot::scheduler::{CycleOutcome, Scheduler, SkipReason};
use candlebot::{Config, Result};

// ============================================================================
// Simulated collaborators
// ============================================================================

struct SimState {
    /// Ticket of the currently open position, if any
    open_ticket: Option<u64>,
    /// Take-profit hit this long after it was set
    tp_hit_after: Option<Duration>,
    tp_set_at: Option<Instant>,
    entries: Vec<OrderRequest>,
    closes: Vec<OrderRequest>,
    reject_entries: bool,
}

struct SimBroker {
    quote: Quote,
    candles: usize,
    state: Mutex<SimState>,
}

impl SimBroker {
    fn new() -> Arc<Self> {
        Self::with_candles(120)
    }

    fn with_candles(candles: usize) -> Arc<Self> {
        Arc::new(Self {
            quote: Quote {
                bid: 49995.0,
                ask: 50000.0,
            },
            candles,
            state: Mutex::new(SimState {
                open_ticket: None,
                tp_hit_after: None,
                tp_set_at: None,
                entries: Vec::new(),
                closes: Vec::new(),
                reject_entries: false,
            }),
        })
    }
}

#[async_trait]
impl BrokerGateway for SimBroker {
    async fn is_alive(&self) -> bool {
        true
    }

    async fn recent_closes(
        &self,
        _symbol: &str,
        _timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<PricePoint>> {
        let count = count.min(self.candles);
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Ok((0..count)
            .map(|i| PricePoint {
                time: start + chrono::Duration::minutes(15 * i as i64),
                close: 49900.0 + i as f64,
            })
            .collect())
    }

    async fn symbol_info(&self, _symbol: &str) -> Result<SymbolInfo> {
        Ok(SymbolInfo {
            point: 0.01,
            digits: 2,
            visible: true,
        })
    }

    async fn select_symbol(&self, _symbol: &str) -> Result<bool> {
        Ok(true)
    }

    async fn quote(&self, _symbol: &str) -> Result<Quote> {
        Ok(self.quote)
    }

    async fn market_order(&self, request: &OrderRequest) -> Result<OrderResult> {
        let mut state = self.state.lock().unwrap();
        if request.position.is_some() {
            // Closing deal against the open position
            state.closes.push(request.clone());
            state.open_ticket = None;
            return Ok(OrderResult {
                retcode: RETCODE_DONE,
                order: 42,
                price: request.price,
                comment: "closed".to_string(),
            });
        }

        if state.reject_entries {
            return Ok(OrderResult {
                retcode: 10019, // no money
                order: 0,
                price: 0.0,
                comment: "rejected".to_string(),
            });
        }

        state.entries.push(request.clone());
        state.open_ticket = Some(42);
        Ok(OrderResult {
            retcode: RETCODE_DONE,
            order: 42,
            price: request.price,
            comment: "filled".to_string(),
        })
    }

    async fn modify_take_profit(&self, _position: u64, _tp: f64) -> Result<OrderResult> {
        let mut state = self.state.lock().unwrap();
        state.tp_set_at = Some(Instant::now());
        Ok(OrderResult {
            retcode: RETCODE_DONE,
            order: 42,
            price: 0.0,
            comment: String::new(),
        })
    }

    async fn position(&self, ticket: u64) -> Result<Option<PositionSnapshot>> {
        let mut state = self.state.lock().unwrap();

        // Simulate the broker closing the position once the TP delay elapsed
        if let (Some(set_at), Some(delay)) = (state.tp_set_at, state.tp_hit_after) {
            if Instant::now() >= set_at + delay {
                state.open_ticket = None;
            }
        }

        if state.open_ticket != Some(ticket) {
            return Ok(None);
        }
        let entry = state.entries.last().cloned().expect("entry recorded");
        Ok(Some(PositionSnapshot {
            ticket,
            symbol: entry.symbol,
            side: entry.side,
            volume: entry.volume,
            entry_price: entry.price,
        }))
    }

    async fn order_deals(&self, order: u64) -> Result<Vec<Deal>> {
        Ok(vec![
            Deal { order, profit: 3.2 },
            Deal {
                order,
                profit: -1.0,
            },
        ])
    }
}

struct FixedPredictor {
    prediction: f64,
}

#[async_trait]
impl Predictor for FixedPredictor {
    async fn predict(&self, window: &[f64]) -> Result<f64> {
        assert_eq!(window.len(), 60, "predictor receives the 60 most recent closes");
        Ok(self.prediction)
    }
}

#[derive(Default)]
struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

fn scheduler(
    broker: Arc<SimBroker>,
    prediction: f64,
) -> (Scheduler, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let scheduler = Scheduler::new(
        broker,
        Arc::new(FixedPredictor { prediction }),
        notifier.clone(),
        Config::default(),
    );
    (scheduler, notifier)
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_full_cycle_closed_by_take_profit() {
    let broker = SimBroker::new();
    broker.state.lock().unwrap().tp_hit_after = Some(Duration::from_secs(120));

    let (scheduler, notifier) = scheduler(broker.clone(), 50500.0);
    let deadline = Instant::now() + Duration::from_secs(900);

    let outcome = scheduler.run_cycle(deadline).await.unwrap();

    let report = match outcome {
        CycleOutcome::Traded(report) => report,
        other => panic!("expected a trade, got {:?}", other),
    };
    assert_eq!(report.reason, ClosureReason::TakeProfit);
    assert_eq!(report.profit, Some(3.2 - 1.0));

    let state = broker.state.lock().unwrap();
    assert_eq!(state.entries.len(), 1);
    assert_eq!(state.entries[0].side, OrderSide::Buy); // 50500 > ask 50000
    assert_eq!(state.entries[0].volume, 0.1);
    assert!(state.closes.is_empty()); // TP hit, no deadline close

    let messages = notifier.messages.lock().unwrap();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].contains("Trade opened"));
    assert!(messages[1].contains("Trade closed"));
    assert!(messages[1].contains("2.20"));
}

#[tokio::test(start_paused = true)]
async fn test_full_cycle_closed_at_deadline() {
    let broker = SimBroker::new();

    let (scheduler, _notifier) = scheduler(broker.clone(), 49000.0);
    let deadline = Instant::now() + Duration::from_secs(900);

    let outcome = scheduler.run_cycle(deadline).await.unwrap();

    let report = match outcome {
        CycleOutcome::Traded(report) => report,
        other => panic!("expected a trade, got {:?}", other),
    };
    assert_eq!(report.reason, ClosureReason::Deadline);

    let state = broker.state.lock().unwrap();
    assert_eq!(state.entries.len(), 1);
    assert_eq!(state.entries[0].side, OrderSide::Sell); // 49000 ≤ ask
    assert_eq!(state.closes.len(), 1);
    assert_eq!(state.closes[0].side, OrderSide::Buy);
    assert_eq!(state.closes[0].volume, 0.1);
    assert_eq!(state.closes[0].price, 50000.0); // shorts close at ask
}

#[tokio::test(start_paused = true)]
async fn test_prediction_band_gates_trading() {
    // 46000 is within ±10% of 50000, 44000 is not
    let in_band = SimBroker::new();
    in_band.state.lock().unwrap().tp_hit_after = Some(Duration::from_secs(60));
    let (scheduler_in, _) = scheduler(in_band.clone(), 46000.0);
    let outcome = scheduler_in
        .run_cycle(Instant::now() + Duration::from_secs(900))
        .await
        .unwrap();
    assert!(matches!(outcome, CycleOutcome::Traded(_)));
    assert_eq!(in_band.state.lock().unwrap().entries.len(), 1);

    let out_of_band = SimBroker::new();
    let (scheduler_out, _) = scheduler(out_of_band.clone(), 44000.0);
    let outcome = scheduler_out
        .run_cycle(Instant::now() + Duration::from_secs(900))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        CycleOutcome::Skipped(SkipReason::PredictionOutOfBand { .. })
    ));
    assert!(out_of_band.state.lock().unwrap().entries.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_entry_rejection_skips_interval() {
    let broker = SimBroker::new();
    broker.state.lock().unwrap().reject_entries = true;

    let (scheduler, notifier) = scheduler(broker.clone(), 50500.0);
    let outcome = scheduler
        .run_cycle(Instant::now() + Duration::from_secs(900))
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        CycleOutcome::Skipped(SkipReason::EntryFailed)
    ));
    let state = broker.state.lock().unwrap();
    assert!(state.entries.is_empty());
    assert!(state.closes.is_empty());
    assert!(notifier.messages.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_short_history_skips_cycle() {
    // Fewer candles than the 60-close prediction window
    let broker = SimBroker::with_candles(30);

    let (scheduler, _) = scheduler(broker.clone(), 50500.0);
    let outcome = scheduler
        .run_cycle(Instant::now() + Duration::from_secs(900))
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        CycleOutcome::Skipped(SkipReason::NotEnoughData)
    ));
    assert!(broker.state.lock().unwrap().entries.is_empty());
}
