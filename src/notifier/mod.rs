use async_trait::async_trait;
use reqwest::Client;

use crate::Result;

/// Best-effort outbound messaging. Delivery failures are logged by the
/// caller, never escalated.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<()>;
}

/// Sends messages through the Telegram Bot API
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    base_url: String,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self::with_base_url("https://api.telegram.org", token, chat_id)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            token: token.into(),
            chat_id: chat_id.into(),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.token);
        let response = self
            .client
            .get(&url)
            .query(&[("chat_id", self.chat_id.as_str()), ("text", message)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Telegram returned {}: {}", status, body).into());
        }

        Ok(())
    }
}

/// Fallback notifier when no Telegram credentials are configured
#[derive(Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        tracing::info!("📣 {}", message);
        Ok(())
    }
}
