use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closing price of one finished candle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePoint {
    pub time: DateTime<Utc>,
    pub close: f64,
}

/// Current top-of-book prices for a symbol
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
}

/// Instrument metadata as reported by the terminal
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SymbolInfo {
    /// Smallest price increment
    pub point: f64,
    /// Quoted decimal precision
    pub digits: u32,
    /// Whether the symbol is enabled for trading in the terminal
    pub visible: bool,
}

/// Candle timeframe
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    H1,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::H1 => "H1",
        }
    }

    pub fn minutes(&self) -> u64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::H1 => 60,
        }
    }
}

/// Direction of a market order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(&self) -> OrderSide {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

/// Entry decision derived from a prediction and the current quote
#[derive(Debug, Clone, PartialEq)]
pub struct TradeIntent {
    pub symbol: String,
    pub side: OrderSide,
    pub price: f64,
    pub volume: f64,
}

impl TradeIntent {
    /// Buy if the prediction is strictly above the current ask, Sell otherwise
    /// (ties resolve to Sell). The requested price is the best price for the
    /// chosen side.
    pub fn from_prediction(symbol: &str, prediction: f64, quote: Quote, volume: f64) -> Self {
        let side = if prediction > quote.ask {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        };
        let price = match side {
            OrderSide::Buy => quote.ask,
            OrderSide::Sell => quote.bid,
        };
        Self {
            symbol: symbol.to_string(),
            side,
            price,
            volume,
        }
    }
}

/// A filled position, alive until the broker reports it closed
#[derive(Debug, Clone)]
pub struct OpenPosition {
    pub ticket: u64,
    pub symbol: String,
    pub side: OrderSide,
    pub entry_price: f64,
    pub volume: f64,
    pub point: f64,
    pub digits: u32,
}

/// One executed fill from the broker's deal history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deal {
    pub order: u64,
    pub profit: f64,
}
