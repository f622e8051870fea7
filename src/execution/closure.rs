use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};

use crate::broker::{BrokerGateway, OrderRequest};
use crate::config::Config;
use crate::execution::retry;
use crate::models::{OpenPosition, OrderSide, Quote};
use crate::Result;

/// How a supervised position ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosureReason {
    /// Broker closed it when the take-profit was hit
    TakeProfit,
    /// Forced close at the interval deadline
    Deadline,
    /// Vanished during the grace period, closed outside the bot
    ClosedExternally,
}

impl std::fmt::Display for ClosureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClosureReason::TakeProfit => write!(f, "take-profit"),
            ClosureReason::Deadline => write!(f, "interval deadline"),
            ClosureReason::ClosedExternally => write!(f, "external close"),
        }
    }
}

/// Outcome of one supervised trade lifecycle
#[derive(Debug, Clone)]
pub struct ClosureReport {
    pub ticket: u64,
    pub reason: ClosureReason,
    /// Realized profit summed from deal history; `None` when the history is
    /// unavailable (unknown, never zero)
    pub profit: Option<f64>,
}

/// Take-profit level for an open position.
///
/// The level never lands inside the broker's minimum-distance band (which
/// would get the modification rejected): a Buy take-profit is at least
/// `ask + min_distance` and a Sell one at most `bid - min_distance`, with
/// equality accepted. After rounding to the quoted precision an extra
/// `margin_points` offset is applied in the trade direction.
pub fn take_profit_level(
    side: OrderSide,
    prediction: f64,
    quote: Quote,
    point: f64,
    digits: u32,
    min_distance_points: f64,
    margin_points: f64,
) -> f64 {
    let min_distance = min_distance_points * point;
    let margin = margin_points * point;
    match side {
        OrderSide::Buy => {
            let floor = prediction.max(quote.ask + min_distance);
            round_to_digits(floor, digits) + margin
        }
        OrderSide::Sell => {
            let ceiling = prediction.min(quote.bid - min_distance);
            round_to_digits(ceiling, digits) - margin
        }
    }
}

fn round_to_digits(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

/// Supervises exactly one open position from entry to closure: attaches the
/// deferred take-profit, polls for an external close and force-closes at the
/// interval deadline.
///
/// One task per position; the scheduler joins it before starting the next
/// cycle, so the gateway is never used by two phases at once.
#[derive(Clone)]
pub struct ClosureSupervisor {
    gateway: Arc<dyn BrokerGateway>,
    grace: Duration,
    min_distance_points: f64,
    tp_margin_points: f64,
    max_retry_attempts: u32,
    retry_backoff: Duration,
    poll_interval: Duration,
    deviation: u32,
    magic: u64,
}

impl ClosureSupervisor {
    pub fn new(gateway: Arc<dyn BrokerGateway>, config: &Config) -> Self {
        Self {
            gateway,
            grace: config.tp_grace,
            min_distance_points: config.min_distance_points,
            tp_margin_points: config.tp_margin_points,
            max_retry_attempts: config.max_retry_attempts,
            retry_backoff: config.retry_backoff,
            poll_interval: config.poll_interval,
            deviation: config.deviation,
            magic: config.magic,
        }
    }

    /// Start supervision as an independent task. The returned handle yields
    /// the closure report; the caller awaits it before the next cycle.
    pub fn spawn(
        &self,
        position: OpenPosition,
        prediction: f64,
        deadline: Instant,
    ) -> JoinHandle<ClosureReport> {
        let supervisor = self.clone();
        tokio::spawn(async move { supervisor.supervise(position, prediction, deadline).await })
    }

    /// Runs to completion, uninterruptible: grace period, TP attachment,
    /// deadline polling, forced close. States only move forward; retries
    /// re-enter the current state, never a previous one.
    pub async fn supervise(
        &self,
        position: OpenPosition,
        prediction: f64,
        deadline: Instant,
    ) -> ClosureReport {
        // Hold the position untouched through the grace period, regardless
        // of how close the deadline is.
        sleep(self.grace).await;

        match self.gateway.position(position.ticket).await {
            Ok(None) => {
                tracing::info!(
                    "Position #{} closed externally during grace period",
                    position.ticket
                );
                return ClosureReport {
                    ticket: position.ticket,
                    reason: ClosureReason::ClosedExternally,
                    profit: None,
                };
            }
            Ok(Some(_)) => {}
            Err(e) => {
                // Lookup failure is not evidence the position is gone
                tracing::warn!("Position lookup failed after grace period: {}", e);
            }
        }

        self.attach_take_profit(&position, prediction).await;

        if self.poll_until_deadline(position.ticket, deadline).await {
            tracing::info!("✓ Position #{} closed before deadline (TP hit)", position.ticket);
            let profit = self.realized_profit(position.ticket).await;
            return ClosureReport {
                ticket: position.ticket,
                reason: ClosureReason::TakeProfit,
                profit,
            };
        }

        self.close_at_deadline(&position).await
    }

    /// TP-Pending → TP-Set | TP-Failed
    async fn attach_take_profit(&self, position: &OpenPosition, prediction: f64) {
        let quote = match self.gateway.quote(&position.symbol).await {
            Ok(quote) => quote,
            Err(e) => {
                tracing::warn!(
                    "No quote for TP computation, position #{} stays deadline-protected: {}",
                    position.ticket,
                    e
                );
                return;
            }
        };

        let tp = take_profit_level(
            position.side,
            prediction,
            quote,
            position.point,
            position.digits,
            self.min_distance_points,
            self.tp_margin_points,
        );
        tracing::info!("TP pending for position #{}: {:.2}", position.ticket, tp);

        let gateway = self.gateway.clone();
        let ticket = position.ticket;
        let outcome: Result<()> = retry(self.max_retry_attempts, self.retry_backoff, || {
            let gateway = gateway.clone();
            async move {
                let result = gateway.modify_take_profit(ticket, tp).await?;
                if result.is_done() {
                    Ok(())
                } else {
                    Err(format!("TP modification rejected, retcode {}", result.retcode).into())
                }
            }
        })
        .await;

        match outcome {
            Ok(()) => tracing::info!("✓ TP set to {:.2} on position #{}", tp, ticket),
            Err(e) => tracing::warn!(
                "TP failed after {} attempts, position #{} stays deadline-protected: {}",
                self.max_retry_attempts,
                ticket,
                e
            ),
        }
    }

    /// Poll once per interval until the deadline. Returns true if the broker
    /// reports the position gone before (or exactly at) the deadline.
    async fn poll_until_deadline(&self, ticket: u64, deadline: Instant) -> bool {
        while Instant::now() < deadline {
            let next = Instant::now() + self.poll_interval;
            sleep_until(next.min(deadline)).await;

            match self.gateway.position(ticket).await {
                Ok(None) => return true,
                Ok(Some(_)) => {}
                Err(e) => tracing::warn!("Position poll failed: {}", e),
            }
        }
        false
    }

    /// Deadline reached with the position still open: one closing market
    /// order, opposite side, equal volume, under the bounded retry policy.
    async fn close_at_deadline(&self, position: &OpenPosition) -> ClosureReport {
        let live_volume = match self.gateway.position(position.ticket).await {
            Ok(Some(snapshot)) => snapshot.volume,
            Ok(None) => {
                tracing::info!(
                    "✓ Position #{} closed right at the deadline (TP hit)",
                    position.ticket
                );
                let profit = self.realized_profit(position.ticket).await;
                return ClosureReport {
                    ticket: position.ticket,
                    reason: ClosureReason::TakeProfit,
                    profit,
                };
            }
            Err(e) => {
                // Close with what we know; the broker rejects it if the
                // position is already gone.
                tracing::warn!("Position lookup failed at deadline: {}", e);
                position.volume
            }
        };

        // Long positions close at bid, short ones at ask
        let close_price = match self.gateway.quote(&position.symbol).await {
            Ok(quote) => match position.side {
                OrderSide::Buy => quote.bid,
                OrderSide::Sell => quote.ask,
            },
            Err(e) => {
                tracing::warn!("No quote for deadline close, using entry price: {}", e);
                position.entry_price
            }
        };

        let request = OrderRequest {
            symbol: position.symbol.clone(),
            side: position.side.opposite(),
            volume: live_volume,
            price: close_price,
            deviation: self.deviation,
            magic: self.magic,
            comment: "candlebot close at interval end".to_string(),
            position: Some(position.ticket),
        };

        let gateway = self.gateway.clone();
        let outcome: Result<()> = retry(self.max_retry_attempts, self.retry_backoff, || {
            let gateway = gateway.clone();
            let request = request.clone();
            async move {
                let result = gateway.market_order(&request).await?;
                if result.is_done() {
                    Ok(())
                } else {
                    Err(format!("Close rejected, retcode {}", result.retcode).into())
                }
            }
        })
        .await;

        match outcome {
            Ok(()) => tracing::info!("✓ Position #{} closed at interval end", position.ticket),
            Err(e) => tracing::error!(
                "Failed to close position #{} after {} attempts: {}",
                position.ticket,
                self.max_retry_attempts,
                e
            ),
        }

        let profit = self.realized_profit(position.ticket).await;
        ClosureReport {
            ticket: position.ticket,
            reason: ClosureReason::Deadline,
            profit,
        }
    }

    /// Realized P&L summed over the deal history of the originating order;
    /// unknown (not zero) when the history cannot be retrieved.
    async fn realized_profit(&self, order: u64) -> Option<f64> {
        match self.gateway.order_deals(order).await {
            Ok(deals) if !deals.is_empty() => Some(deals.iter().map(|d| d.profit).sum()),
            Ok(_) => {
                tracing::warn!("No deal history for order #{}, P&L unknown", order);
                None
            }
            Err(e) => {
                tracing::warn!("Could not retrieve deal history for order #{}: {}", order, e);
                None
            }
        }
    }
}
