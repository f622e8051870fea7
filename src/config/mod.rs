use std::time::Duration;

use crate::models::Timeframe;

/// Runtime configuration, read once at startup from the environment.
///
/// Every knob has a code default matching the production setup, so a bare
/// `.env` with just the endpoint URLs is enough to run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Instrument to trade
    pub symbol: String,
    pub timeframe: Timeframe,
    /// Trading cycle length in minutes; ticks align to wall-clock boundaries
    pub interval_minutes: u32,
    /// Lot size per entry
    pub volume: f64,
    /// Max slippage for market orders, in points
    pub deviation: u32,
    /// Expert id attached to every order
    pub magic: u64,
    /// Candles fetched per cycle
    pub history_len: usize,
    /// Closes handed to the predictor
    pub window_len: usize,
    /// Prediction accepted iff within this fraction of the current ask
    pub sanity_band: f64,
    /// Hold time before the take-profit is attached
    pub tp_grace: Duration,
    /// Broker minimum-distance band, in points
    pub min_distance_points: f64,
    /// Extra offset beyond the computed take-profit, in points.
    /// Kept tunable until product confirms the intended distance.
    pub tp_margin_points: f64,
    /// Attempts for take-profit modification and deadline close
    pub max_retry_attempts: u32,
    /// Pause between retry attempts
    pub retry_backoff: Duration,
    /// Position poll rate while waiting for the deadline
    pub poll_interval: Duration,
    /// Pause after an unclassified cycle failure
    pub error_cooldown: Duration,

    /// MT5 bridge endpoint
    pub broker_url: String,
    /// Model server endpoint
    pub predictor_url: String,
    /// Telegram credentials; notifications fall back to the log when unset
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbol: "BTCUSD".to_string(),
            timeframe: Timeframe::M15,
            interval_minutes: 15,
            volume: 0.1,
            deviation: 20,
            magic: 234000,
            history_len: 120,
            window_len: 60,
            sanity_band: 0.10,
            tp_grace: Duration::from_secs(300),
            min_distance_points: 10.0,
            tp_margin_points: 100.0,
            max_retry_attempts: 10,
            retry_backoff: Duration::from_secs(1),
            poll_interval: Duration::from_secs(1),
            error_cooldown: Duration::from_secs(60),
            broker_url: "http://127.0.0.1:8228".to_string(),
            predictor_url: "http://127.0.0.1:8229".to_string(),
            telegram_token: None,
            telegram_chat_id: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Self {
            symbol: env_or("BOT_SYMBOL", defaults.symbol),
            timeframe: defaults.timeframe,
            interval_minutes: env_parse("BOT_INTERVAL_MINUTES", defaults.interval_minutes),
            volume: env_parse("BOT_VOLUME", defaults.volume),
            deviation: env_parse("BOT_DEVIATION", defaults.deviation),
            magic: env_parse("BOT_MAGIC", defaults.magic),
            history_len: env_parse("BOT_HISTORY_LEN", defaults.history_len),
            window_len: env_parse("BOT_WINDOW_LEN", defaults.window_len),
            sanity_band: env_parse("BOT_SANITY_BAND", defaults.sanity_band),
            tp_grace: Duration::from_secs(env_parse("BOT_TP_GRACE_SECS", 300u64)),
            min_distance_points: env_parse("BOT_MIN_DISTANCE_POINTS", defaults.min_distance_points),
            tp_margin_points: env_parse("BOT_TP_MARGIN_POINTS", defaults.tp_margin_points),
            max_retry_attempts: env_parse("BOT_MAX_RETRY_ATTEMPTS", defaults.max_retry_attempts),
            retry_backoff: Duration::from_secs(env_parse("BOT_RETRY_BACKOFF_SECS", 1u64)),
            poll_interval: defaults.poll_interval,
            error_cooldown: Duration::from_secs(env_parse("BOT_ERROR_COOLDOWN_SECS", 60u64)),
            broker_url: env_or("BROKER_URL", defaults.broker_url),
            predictor_url: env_or("PREDICTOR_URL", defaults.predictor_url),
            telegram_token: std::env::var("TELEGRAM_BOT_TOKEN").ok(),
            telegram_chat_id: std::env::var("TELEGRAM_CHAT_ID").ok(),
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_production_setup() {
        let config = Config::default();
        assert_eq!(config.symbol, "BTCUSD");
        assert_eq!(config.interval_minutes, 15);
        assert_eq!(config.volume, 0.1);
        assert_eq!(config.window_len, 60);
        assert_eq!(config.sanity_band, 0.10);
        assert_eq!(config.tp_grace, Duration::from_secs(300));
        assert_eq!(config.max_retry_attempts, 10);
        assert_eq!(config.tp_margin_points, 100.0);
    }

    #[test]
    fn test_env_parse_falls_back_on_garbage() {
        std::env::set_var("BOT_TEST_GARBAGE", "not-a-number");
        let value: u32 = env_parse("BOT_TEST_GARBAGE", 7);
        assert_eq!(value, 7);
        std::env::remove_var("BOT_TEST_GARBAGE");
    }
}
