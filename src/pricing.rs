//! Price resolution: live quote, then manual entry, then proxy index.

use std::collections::HashMap;

use crate::store::ManualPrices;
use crate::types::{root_symbol, PriceSource};

/// Manual entries at this value have not been filled in yet
pub const UNSET_PRICE: f64 = 0.0;

/// Live last-trade prices keyed by full contract symbol.
#[derive(Debug, Clone, Default)]
pub struct LiveQuotes {
    prices: HashMap<String, f64>,
}

impl LiveQuotes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-positive or non-finite quotes are dropped.
    pub fn insert(&mut self, symbol: &str, price: f64) {
        if price.is_finite() && price > 0.0 {
            self.prices.insert(quote_key(symbol), price);
        }
    }

    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.prices.get(&quote_key(symbol)).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Prices derived from a proxy index, keyed by root.
#[derive(Debug, Clone, Default)]
pub struct ProxyQuotes {
    prices: HashMap<String, f64>,
}

impl ProxyQuotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, root: &str, price: f64) {
        if price.is_finite() && price > 0.0 {
            self.prices.insert(root_symbol(root), price);
        }
    }

    pub fn get(&self, root: &str) -> Option<f64> {
        self.prices.get(&root_symbol(root)).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }
}

/// Feed symbols are compared upper-cased with a single leading `/`.
fn quote_key(symbol: &str) -> String {
    format!("/{}", symbol.trim().trim_start_matches('/').to_uppercase())
}

/// Outcome of a price lookup. `Unresolved` is not an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    Resolved { price: f64, source: PriceSource },
    Unresolved,
}

impl Resolution {
    pub fn price(&self) -> Option<f64> {
        match self {
            Resolution::Resolved { price, .. } => Some(*price),
            Resolution::Unresolved => None,
        }
    }
}

/// The price sources available for one refresh.
#[derive(Debug, Clone, Copy)]
pub struct PriceSources<'a> {
    manual: &'a ManualPrices,
    live: Option<&'a LiveQuotes>,
    proxy: Option<&'a ProxyQuotes>,
}

impl<'a> PriceSources<'a> {
    pub fn manual_only(manual: &'a ManualPrices) -> Self {
        Self {
            manual,
            live: None,
            proxy: None,
        }
    }

    pub fn with_live(mut self, live: &'a LiveQuotes) -> Self {
        self.live = Some(live);
        self
    }

    pub fn with_proxy(mut self, proxy: &'a ProxyQuotes) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Resolve a unit price for a contract symbol.
    pub fn resolve(&self, symbol: &str) -> Resolution {
        if let Some(price) = self.live.and_then(|live| live.get(symbol)) {
            return Resolution::Resolved {
                price,
                source: PriceSource::Live,
            };
        }

        let root = root_symbol(symbol);
        if let Some(price) = self.manual.get(&root).filter(|p| *p > UNSET_PRICE) {
            return Resolution::Resolved {
                price,
                source: PriceSource::Manual,
            };
        }

        if let Some(price) = self.proxy.and_then(|proxy| proxy.get(&root)) {
            return Resolution::Resolved {
                price,
                source: PriceSource::Proxy,
            };
        }

        Resolution::Unresolved
    }
}
