//! Finnhub quote client used to derive prices for roots that track an index.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::ProxyMapping;
use crate::error::GatewayError;
use crate::pricing::ProxyQuotes;

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    /// Current price, 0 when Finnhub does not know the symbol
    #[serde(default)]
    c: f64,
    /// Previous close
    #[serde(default)]
    pc: f64,
}

#[derive(Debug, Clone)]
pub struct FinnhubClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl FinnhubClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Previous session close of an index symbol such as `^RUT`.
    pub async fn previous_close(&self, index_symbol: &str) -> Result<f64, GatewayError> {
        let response = self
            .http
            .get(format!("{}/api/v1/quote", self.base_url))
            .query(&[("symbol", index_symbol), ("token", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::Status {
                context: "Proxy quote fetch failed",
                status: response.status().as_u16(),
            });
        }

        let quote: QuoteResponse = serde_json::from_str(&response.text().await?)?;
        if quote.c == 0.0 || !quote.pc.is_finite() || quote.pc <= 0.0 {
            return Err(GatewayError::ProxyUnavailable(index_symbol.to_string()));
        }
        Ok(quote.pc)
    }

    /// Prices for every mapping whose root is in `roots`. Failed proxies are logged and left out.
    pub async fn proxy_quotes(&self, mappings: &[ProxyMapping], roots: &[String]) -> ProxyQuotes {
        let mut quotes = ProxyQuotes::new();

        for mapping in mappings.iter().filter(|m| roots.contains(&m.root)) {
            match self.previous_close(&mapping.index_symbol).await {
                Ok(close) => {
                    let price = close * mapping.ratio;
                    info!(
                        "[PROXY] {} = {:.2} ({} close {:.2} x {})",
                        mapping.root, price, mapping.index_symbol, close, mapping.ratio
                    );
                    quotes.insert(&mapping.root, price);
                }
                Err(e) => warn!("[PROXY] {} via {}: {}", mapping.root, mapping.index_symbol, e),
            }
        }

        quotes
    }
}
