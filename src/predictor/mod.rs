use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Opaque price model: a window of recent closes in, one estimate out.
///
/// Normalization and reshaping happen on the model side; the bot only passes
/// the raw closing prices through.
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Predict the closing price of the upcoming interval from the most
    /// recent closes, ordered oldest first.
    async fn predict(&self, window: &[f64]) -> Result<f64>;
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    closes: &'a [f64],
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    price: f64,
}

/// Client for the model inference server
#[derive(Clone)]
pub struct RestPredictor {
    client: Client,
    base_url: String,
}

impl RestPredictor {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Predictor for RestPredictor {
    async fn predict(&self, window: &[f64]) -> Result<f64> {
        let url = format!("{}/predict", self.base_url);
        let response: PredictResponse = self
            .client
            .post(&url)
            .json(&PredictRequest { closes: window })
            .send()
            .await?
            .json()
            .await?;

        Ok(response.price)
    }
}
