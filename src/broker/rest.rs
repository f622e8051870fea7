use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{BrokerGateway, OrderRequest, OrderResult, PositionSnapshot};
use crate::models::{Deal, PricePoint, Quote, SymbolInfo, Timeframe};
use crate::Result;

/// Client for the MT5 terminal HTTP bridge.
///
/// The terminal itself only exposes a desktop API; a small bridge process
/// running next to it re-exposes the operations the bot needs over localhost
/// HTTP. One `RestBroker` wraps one terminal session.
#[derive(Clone)]
pub struct RestBroker {
    client: Client,
    base_url: String,
}

// ============== Response Types ==============

#[derive(Debug, Deserialize)]
struct SessionStatus {
    connected: bool,
}

#[derive(Debug, Deserialize)]
struct CandleRaw {
    /// Candle open time, epoch seconds
    time: i64,
    close: f64,
}

#[derive(Debug, Deserialize)]
struct SelectResponse {
    selected: bool,
}

#[derive(Debug, Serialize)]
struct ModifyRequest {
    position: u64,
    take_profit: f64,
}

// ============== Implementation ==============

impl RestBroker {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl BrokerGateway for RestBroker {
    async fn is_alive(&self) -> bool {
        let url = self.url("/session");
        match self.client.get(&url).send().await {
            Ok(response) => match response.json::<SessionStatus>().await {
                Ok(status) => status.connected,
                Err(e) => {
                    tracing::warn!("Malformed session status from bridge: {}", e);
                    false
                }
            },
            Err(e) => {
                tracing::warn!("Session check failed: {}", e);
                false
            }
        }
    }

    async fn recent_closes(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<PricePoint>> {
        let url = format!(
            "{}/candles?symbol={}&timeframe={}&count={}",
            self.base_url,
            symbol,
            timeframe.as_str(),
            count
        );

        let candles: Vec<CandleRaw> = self.client.get(&url).send().await?.json().await?;

        let mut points = Vec::with_capacity(candles.len());
        for candle in candles {
            let time = DateTime::from_timestamp(candle.time, 0)
                .ok_or_else(|| format!("Invalid candle timestamp: {}", candle.time))?;
            points.push(PricePoint {
                time,
                close: candle.close,
            });
        }

        // Bridge returns oldest-first; enforce it in case of a misbehaving bridge
        points.sort_by_key(|p| p.time);
        Ok(points)
    }

    async fn symbol_info(&self, symbol: &str) -> Result<SymbolInfo> {
        let url = format!("{}/symbols/{}", self.base_url, symbol);
        let info: SymbolInfo = self.client.get(&url).send().await?.json().await?;
        Ok(info)
    }

    async fn select_symbol(&self, symbol: &str) -> Result<bool> {
        let url = format!("{}/symbols/{}/select", self.base_url, symbol);
        let response: SelectResponse = self.client.post(&url).send().await?.json().await?;
        Ok(response.selected)
    }

    async fn quote(&self, symbol: &str) -> Result<Quote> {
        let url = format!("{}/tick?symbol={}", self.base_url, symbol);
        let quote: Quote = self.client.get(&url).send().await?.json().await?;
        Ok(quote)
    }

    async fn market_order(&self, request: &OrderRequest) -> Result<OrderResult> {
        let url = self.url("/order");
        let result: OrderResult = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await?
            .json()
            .await?;

        tracing::debug!(
            retcode = result.retcode,
            order = result.order,
            "Order request answered"
        );
        Ok(result)
    }

    async fn modify_take_profit(&self, position: u64, take_profit: f64) -> Result<OrderResult> {
        let url = self.url("/position/modify");
        let body = ModifyRequest {
            position,
            take_profit,
        };
        let result: OrderResult = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;
        Ok(result)
    }

    async fn position(&self, ticket: u64) -> Result<Option<PositionSnapshot>> {
        let url = format!("{}/positions?ticket={}", self.base_url, ticket);
        let positions: Vec<PositionSnapshot> = self.client.get(&url).send().await?.json().await?;
        Ok(positions.into_iter().next())
    }

    async fn order_deals(&self, order: u64) -> Result<Vec<Deal>> {
        let url = format!("{}/deals?order={}", self.base_url, order);
        let deals: Vec<Deal> = self.client.get(&url).send().await?.json().await?;
        Ok(deals)
    }
}
