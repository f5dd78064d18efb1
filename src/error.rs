//! Error types for the gateway boundary, the manual price store and input parsing.

use thiserror::Error;

/// Malformed broker or user input. Raised instead of coercing bad values to zero.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' is not a valid number: '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("field '{field}' must be a whole number of contracts: '{value}'")]
    FractionalQuantity { field: &'static str, value: String },

    #[error("field '{field}' is not finite")]
    NonFinite { field: &'static str },

    #[error("empty symbol")]
    EmptySymbol,
}

/// Failures talking to the brokerage or the proxy quote provider.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Login failed (status {0})")]
    LoginFailed(u16),

    #[error("{context} (status {status})")]
    Status { context: &'static str, status: u16 },

    #[error("No account found")]
    NoAccount,

    #[error("No remembered session - run `login` first")]
    NoSession,

    #[error("proxy quote unavailable for {0}")]
    ProxyUnavailable(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed response: {0}")]
    Parse(#[from] ParseError),
}

/// Failures reading or writing the local key-value files.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt store file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid price {0}: must be a finite, non-negative number")]
    InvalidPrice(f64),
}
