//! Environment-driven configuration.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::types::{parse_decimal, root_symbol};

/// tastytrade production API
pub const DEFAULT_TASTYTRADE_API_URL: &str = "https://api.tastytrade.com";

/// Finnhub REST API
pub const DEFAULT_FINNHUB_API_URL: &str = "https://finnhub.io";

/// Russell 2000 futures priced off the cash index when nothing better is available
pub const DEFAULT_PROXY_SYMBOLS: &str = "/RTY=^RUT,/M2K=^RUT";

/// Get the tastytrade base URL
pub fn tastytrade_api_url() -> String {
    std::env::var("TASTYTRADE_API_URL").unwrap_or_else(|_| DEFAULT_TASTYTRADE_API_URL.to_string())
}

/// Directory holding manual_prices.json and session.json (default: ./data)
pub fn data_dir() -> PathBuf {
    std::env::var("DASHBOARD_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

/// Per-request HTTP timeout (default: 15s)
pub fn http_timeout() -> Duration {
    let secs = std::env::var("HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(15);
    Duration::from_secs(secs)
}

pub fn finnhub_api_url() -> String {
    std::env::var("FINNHUB_API_URL").unwrap_or_else(|_| DEFAULT_FINNHUB_API_URL.to_string())
}

/// Proxy pricing is disabled without a key
pub fn finnhub_api_key() -> Option<String> {
    std::env::var("FINNHUB_API_KEY")
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

/// Root -> index mapping for proxy pricing
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyMapping {
    pub root: String,
    pub index_symbol: String,
    /// Futures price per index point
    pub ratio: f64,
}

/// Proxy mappings from `PROXY_SYMBOLS`, falling back to the Russell defaults.
pub fn proxy_mappings() -> Result<Vec<ProxyMapping>> {
    let raw = std::env::var("PROXY_SYMBOLS").unwrap_or_else(|_| DEFAULT_PROXY_SYMBOLS.to_string());
    parse_proxy_mappings(&raw).context("invalid PROXY_SYMBOLS")
}

/// Parse `ROOT=INDEX[*RATIO]` entries separated by commas, e.g. `/RTY=^RUT,/M2K=^RUT*1.0`.
pub fn parse_proxy_mappings(raw: &str) -> Result<Vec<ProxyMapping>> {
    let mut mappings = Vec::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((root, target)) = entry.split_once('=') else {
            bail!("expected ROOT=INDEX, got '{}'", entry);
        };
        let (index_symbol, ratio) = match target.split_once('*') {
            Some((index, ratio)) => (index.trim(), parse_decimal("ratio", ratio)?),
            None => (target.trim(), 1.0),
        };
        if root.trim().is_empty() || index_symbol.is_empty() {
            bail!("empty root or index in '{}'", entry);
        }
        if ratio <= 0.0 {
            bail!("ratio must be positive in '{}'", entry);
        }
        mappings.push(ProxyMapping {
            root: root_symbol(root),
            index_symbol: index_symbol.to_string(),
            ratio,
        });
    }

    Ok(mappings)
}
