// Broker terminal gateway
pub mod rest;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{Deal, OrderSide, PricePoint, Quote, SymbolInfo, Timeframe};
use crate::Result;

pub use rest::RestBroker;

/// Terminal return code for a fully executed request
pub const RETCODE_DONE: u32 = 10009;

/// Market order request as sent to the terminal.
///
/// `position` is set when the order closes an existing position instead of
/// opening a new one (the terminal treats a close as an opposite-side deal
/// against that ticket).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub volume: f64,
    pub price: f64,
    pub deviation: u32,
    pub magic: u64,
    pub comment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
}

/// Terminal response to an order or modification request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    pub retcode: u32,
    /// Ticket of the order the request produced
    pub order: u64,
    /// Executed price
    pub price: f64,
    #[serde(default)]
    pub comment: String,
}

impl OrderResult {
    pub fn is_done(&self) -> bool {
        self.retcode == RETCODE_DONE
    }
}

/// An open position as reported by the terminal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub ticket: u64,
    pub symbol: String,
    pub side: OrderSide,
    pub volume: f64,
    pub entry_price: f64,
}

/// Operations the bot consumes from the broker terminal.
///
/// The session handle is owned by the implementation; callers check liveness
/// explicitly instead of relying on ambient global state.
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    /// Whether the terminal session is initialized and connected
    async fn is_alive(&self) -> bool;

    /// The `count` most recent *closed* candles, oldest first
    async fn recent_closes(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<PricePoint>>;

    async fn symbol_info(&self, symbol: &str) -> Result<SymbolInfo>;

    /// Enable a symbol for trading in the terminal
    async fn select_symbol(&self, symbol: &str) -> Result<bool>;

    async fn quote(&self, symbol: &str) -> Result<Quote>;

    async fn market_order(&self, request: &OrderRequest) -> Result<OrderResult>;

    async fn modify_take_profit(&self, position: u64, take_profit: f64) -> Result<OrderResult>;

    /// Open position by ticket, `None` once the broker reports it closed
    async fn position(&self, ticket: u64) -> Result<Option<PositionSnapshot>>;

    /// Deal history for the originating order ticket
    async fn order_deals(&self, order: u64) -> Result<Vec<Deal>>;
}
