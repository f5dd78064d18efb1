//! Core type definitions for the exposure and leverage engine.

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Futures expiry month codes (Jan..Dec).
const MONTH_CODES: &[char] = &['F', 'G', 'H', 'J', 'K', 'M', 'N', 'Q', 'U', 'V', 'X', 'Z'];

/// Extract the `/`-prefixed, upper-cased root of a futures symbol.
///
/// `/ZBU5` -> `/ZB`, `mesz25` -> `/MES`, `/ESZ5:XCME` -> `/ES`, `/M2KZ5` -> `/M2K`.
/// A root has no trailing expiry, so `root_symbol(root_symbol(s)) == root_symbol(s)`.
pub fn root_symbol(symbol: &str) -> String {
    let upper = symbol.trim().to_uppercase();
    let body = upper.trim_start_matches('/');
    let mut root = body
        .split(|c: char| c == ':' || c.is_whitespace())
        .next()
        .unwrap_or_default();

    while let Some(stripped) = strip_expiry(root) {
        root = stripped;
    }

    format!("/{root}")
}

/// Drop a trailing `<month><1-2 digit year>` when at least one root character precedes it.
fn strip_expiry(body: &str) -> Option<&str> {
    let bytes = body.as_bytes();
    let digits = bytes.iter().rev().take_while(|b| b.is_ascii_digit()).count();
    if !(1..=2).contains(&digits) {
        return None;
    }
    let month_at = bytes.len().checked_sub(digits + 1)?;
    if month_at == 0 || !MONTH_CODES.contains(&char::from(bytes[month_at])) {
        return None;
    }
    Some(&body[..month_at])
}

/// One open futures line item, validated at the gateway boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub underlying: Option<String>,
    pub root: String,
    /// Positive = long, negative = short.
    pub quantity: i64,
    /// Broker-supplied point value, used when the root is not in the sizing table.
    pub multiplier: Option<f64>,
}

impl Position {
    pub fn new(
        symbol: impl Into<String>,
        quantity: i64,
        multiplier: Option<f64>,
    ) -> Result<Self, ParseError> {
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            return Err(ParseError::EmptySymbol);
        }
        if let Some(m) = multiplier {
            if !m.is_finite() {
                return Err(ParseError::NonFinite { field: "multiplier" });
            }
        }
        Ok(Self {
            root: root_symbol(&symbol),
            symbol,
            underlying: None,
            quantity,
            multiplier,
        })
    }

    pub fn with_underlying(mut self, underlying: impl Into<String>) -> Self {
        self.underlying = Some(underlying.into());
        self
    }
}

/// Balance plus positions for the single dashboard account.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSnapshot {
    pub account_number: String,
    pub net_liquidating_value: f64,
    pub positions: Vec<Position>,
}

/// Where a resolved price came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    Live,
    Manual,
    Proxy,
}

impl std::fmt::Display for PriceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceSource::Live => write!(f, "Live"),
            PriceSource::Manual => write!(f, "Manual"),
            PriceSource::Proxy => write!(f, "Proxy"),
        }
    }
}

/// Direction of the summed quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetPosition {
    Long,
    Short,
    Flat,
}

impl NetPosition {
    pub fn from_quantity(net_quantity: i64) -> Self {
        match net_quantity.signum() {
            1 => NetPosition::Long,
            -1 => NetPosition::Short,
            _ => NetPosition::Flat,
        }
    }
}

impl std::fmt::Display for NetPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetPosition::Long => write!(f, "Net Long"),
            NetPosition::Short => write!(f, "Net Short"),
            NetPosition::Flat => write!(f, "Flat"),
        }
    }
}

/// Parse a decimal that may arrive as `"4500.25"` or `4500.25`.
pub fn parse_decimal(field: &'static str, raw: &str) -> Result<f64, ParseError> {
    let value: f64 = raw.trim().parse().map_err(|_| ParseError::InvalidNumber {
        field,
        value: raw.to_string(),
    })?;
    if !value.is_finite() {
        return Err(ParseError::NonFinite { field });
    }
    Ok(value)
}

/// Parse a contract count. `"2"`, `"-1"` and `"2.0"` are accepted; `"1.5"` is not.
pub fn parse_quantity(field: &'static str, raw: &str) -> Result<i64, ParseError> {
    let trimmed = raw.trim();
    if let Ok(q) = trimmed.parse::<i64>() {
        return Ok(q);
    }
    let value = parse_decimal(field, trimmed)?;
    if value.fract() != 0.0 || value.abs() > i64::MAX as f64 {
        return Err(ParseError::FractionalQuantity {
            field,
            value: raw.to_string(),
        });
    }
    Ok(value as i64)
}
