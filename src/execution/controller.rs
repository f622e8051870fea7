use std::sync::Arc;

use crate::broker::{BrokerGateway, OrderRequest};
use crate::config::Config;
use crate::execution::TradeError;
use crate::models::{OpenPosition, TradeIntent};

/// Opens positions. At most one position is in flight at a time; the
/// scheduler enforces that by waiting for the closure supervisor before the
/// next cycle.
pub struct TradeController {
    gateway: Arc<dyn BrokerGateway>,
    deviation: u32,
    magic: u64,
}

impl TradeController {
    pub fn new(gateway: Arc<dyn BrokerGateway>, config: &Config) -> Self {
        Self {
            gateway,
            deviation: config.deviation,
            magic: config.magic,
        }
    }

    /// Submit a market entry for `symbol` based on `prediction`.
    ///
    /// No stop-loss or take-profit is attached here; the take-profit is set
    /// later by the closure supervisor. Failures are not retried within the
    /// cycle.
    pub async fn enter(
        &self,
        symbol: &str,
        prediction: f64,
        volume: f64,
    ) -> Result<OpenPosition, TradeError> {
        if !self.gateway.is_alive().await {
            return Err(TradeError::SessionDown);
        }

        let mut info = self.gateway.symbol_info(symbol).await?;
        if !info.visible {
            tracing::warn!("{} is not visible, trying to enable it", symbol);
            if !self.gateway.select_symbol(symbol).await? {
                return Err(TradeError::SymbolUnavailable(symbol.to_string()));
            }
            info = self.gateway.symbol_info(symbol).await?;
            if !info.visible {
                return Err(TradeError::SymbolUnavailable(symbol.to_string()));
            }
        }

        let quote = self.gateway.quote(symbol).await?;
        let intent = TradeIntent::from_prediction(symbol, prediction, quote, volume);

        let request = OrderRequest {
            symbol: intent.symbol.clone(),
            side: intent.side,
            volume: intent.volume,
            price: intent.price,
            deviation: self.deviation,
            magic: self.magic,
            comment: "candlebot open".to_string(),
            position: None,
        };

        let result = self.gateway.market_order(&request).await?;
        if !result.is_done() {
            tracing::error!(
                retcode = result.retcode,
                comment = %result.comment,
                "Entry order rejected: {:?}",
                request
            );
            return Err(TradeError::OrderRejected {
                retcode: result.retcode,
                comment: result.comment,
                request,
            });
        }

        tracing::info!(
            "✓ Opened {:?} position #{} on {} @ {:.2} ({} lots)",
            intent.side,
            result.order,
            symbol,
            result.price,
            volume
        );

        Ok(OpenPosition {
            ticket: result.order,
            symbol: symbol.to_string(),
            side: intent.side,
            entry_price: result.price,
            volume,
            point: info.point,
            digits: info.digits,
        })
    }
}
