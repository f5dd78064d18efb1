//! tastytrade REST client: session login, account, balance, positions and quotes.
//!
//! Responses are parsed into validated records here. Nothing loosely typed
//! leaves this module.

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, ParseError};
use crate::pricing::LiveQuotes;
use crate::types::{parse_decimal, parse_quantity, AccountSnapshot, Position};

const FUTURE_INSTRUMENT_TYPE: &str = "Future";

/// How to open a session.
#[derive(Clone)]
pub enum Credentials {
    Password { login: String, password: String },
    RememberToken { login: String, token: String },
}

impl Credentials {
    fn body(&self) -> Value {
        match self {
            Credentials::Password { login, password } => json!({
                "login": login,
                "password": password,
                "remember-me": true,
            }),
            Credentials::RememberToken { login, token } => json!({
                "login": login,
                "remember-token": token,
                "remember-me": true,
            }),
        }
    }

    fn login(&self) -> &str {
        match self {
            Credentials::Password { login, .. } | Credentials::RememberToken { login, .. } => {
                login.as_str()
            }
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login())
            .finish_non_exhaustive()
    }
}

/// An authenticated session.
#[derive(Clone)]
pub struct Session {
    pub login: String,
    pub session_token: String,
    pub remember_token: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("login", &self.login)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct Items<T> {
    items: Vec<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SessionData {
    session_token: String,
    remember_token: Option<String>,
}

#[derive(Deserialize)]
struct AccountItem {
    account: AccountInfo,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct AccountInfo {
    account_number: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct BalanceData {
    net_liquidating_value: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawPosition {
    symbol: Option<String>,
    instrument_type: Option<String>,
    underlying_symbol: Option<String>,
    quantity: Option<Value>,
    quantity_direction: Option<String>,
    contract_value: Option<Value>,
    multiplier: Option<Value>,
}

#[derive(Deserialize)]
struct RawQuote {
    symbol: Option<String>,
    last: Option<Value>,
    mark: Option<Value>,
}

/// Broker numbers arrive either as JSON numbers or as decimal strings.
fn number_text(field: &'static str, value: &Value) -> Result<String, ParseError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Err(ParseError::MissingField(field)),
        other => Err(ParseError::InvalidNumber {
            field,
            value: other.to_string(),
        }),
    }
}

fn required_decimal(field: &'static str, value: Option<&Value>) -> Result<f64, ParseError> {
    let value = value.ok_or(ParseError::MissingField(field))?;
    parse_decimal(field, &number_text(field, value)?)
}

/// Absent, null and zero all mean "not supplied".
fn optional_size(field: &'static str, value: Option<&Value>) -> Result<Option<f64>, ParseError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => {
            let size = parse_decimal(field, &number_text(field, v)?)?;
            Ok((size != 0.0).then_some(size))
        }
    }
}

impl TryFrom<RawPosition> for Position {
    type Error = ParseError;

    fn try_from(raw: RawPosition) -> Result<Self, Self::Error> {
        let symbol = raw.symbol.ok_or(ParseError::MissingField("symbol"))?;
        let quantity = raw.quantity.as_ref().ok_or(ParseError::MissingField("quantity"))?;
        let mut quantity = parse_quantity("quantity", &number_text("quantity", quantity)?)?;

        // Quantities are reported unsigned with a separate direction.
        if raw.quantity_direction.as_deref() == Some("Short") && quantity > 0 {
            quantity = -quantity;
        }

        // contract-value is the broker's own point value and wins over multiplier.
        let multiplier = match optional_size("contract-value", raw.contract_value.as_ref())? {
            Some(size) => Some(size),
            None => optional_size("multiplier", raw.multiplier.as_ref())?,
        };

        let position = Position::new(symbol, quantity, multiplier)?;
        Ok(match raw.underlying_symbol {
            Some(underlying) => position.with_underlying(underlying),
            None => position,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TastytradeClient {
    http: Client,
    base_url: String,
}

impl TastytradeClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<Session, GatewayError> {
        info!("[SESSION] Logging in as {}", credentials.login());

        let response = self
            .http
            .post(format!("{}/sessions", self.base_url))
            .json(&credentials.body())
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED => return Err(GatewayError::InvalidCredentials),
            status => return Err(GatewayError::LoginFailed(status.as_u16())),
        }

        let data: Envelope<SessionData> = parse_body(response).await?;
        info!("[SESSION] ✅ Session established");

        Ok(Session {
            login: credentials.login().to_string(),
            session_token: data.data.session_token,
            remember_token: data.data.remember_token,
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        session: &Session,
        path: &str,
        query: &[(&str, &str)],
        context: &'static str,
    ) -> Result<T, GatewayError> {
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .header("Authorization", &session.session_token)
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::Status {
                context,
                status: response.status().as_u16(),
            });
        }
        parse_body(response).await
    }

    /// The first account on the login. Multiple accounts are not supported.
    pub async fn account_number(&self, session: &Session) -> Result<String, GatewayError> {
        let data: Envelope<Items<AccountItem>> = self
            .get(session, "/customers/me/accounts", &[], "Accounts fetch failed")
            .await?;

        let accounts = data.data.items;
        if accounts.len() > 1 {
            debug!("[ACCOUNT] {} accounts found, using the first", accounts.len());
        }
        accounts
            .into_iter()
            .next()
            .map(|item| item.account.account_number)
            .filter(|n| !n.is_empty())
            .ok_or(GatewayError::NoAccount)
    }

    pub async fn net_liquidating_value(
        &self,
        session: &Session,
        account_number: &str,
    ) -> Result<f64, GatewayError> {
        let data: Envelope<BalanceData> = self
            .get(
                session,
                &format!("/accounts/{account_number}/balances"),
                &[],
                "Balance fetch failed",
            )
            .await?;

        Ok(required_decimal(
            "net-liquidating-value",
            data.data.net_liquidating_value.as_ref(),
        )?)
    }

    /// Open futures positions. Other instrument types are skipped.
    pub async fn futures_positions(
        &self,
        session: &Session,
        account_number: &str,
    ) -> Result<Vec<Position>, GatewayError> {
        let data: Envelope<Items<RawPosition>> = self
            .get(
                session,
                &format!("/accounts/{account_number}/positions"),
                &[],
                "Positions fetch failed",
            )
            .await?;

        let total = data.data.items.len();
        let positions = data
            .data
            .items
            .into_iter()
            .filter(|p| p.instrument_type.as_deref() == Some(FUTURE_INSTRUMENT_TYPE))
            .map(Position::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            "[ACCOUNT] {} futures positions out of {} total",
            positions.len(),
            total
        );
        Ok(positions)
    }

    /// account -> balance -> positions, one call after another.
    pub async fn snapshot(&self, session: &Session) -> Result<AccountSnapshot, GatewayError> {
        let account_number = self.account_number(session).await?;
        let net_liquidating_value = self.net_liquidating_value(session, &account_number).await?;
        let positions = self.futures_positions(session, &account_number).await?;

        info!(
            "[ACCOUNT] {} | NLV {:.2} | {} futures positions",
            account_number,
            net_liquidating_value,
            positions.len()
        );

        Ok(AccountSnapshot {
            account_number,
            net_liquidating_value,
            positions,
        })
    }

    /// Last-trade prices (mark when no trade) for the given contract symbols.
    /// Quotes without a usable price are skipped.
    pub async fn live_quotes(
        &self,
        session: &Session,
        symbols: &[String],
    ) -> Result<LiveQuotes, GatewayError> {
        let mut quotes = LiveQuotes::new();
        if symbols.is_empty() {
            return Ok(quotes);
        }

        let query: Vec<(&str, &str)> = symbols.iter().map(|s| ("future", s.as_str())).collect();
        let data: Envelope<Items<RawQuote>> = self
            .get(session, "/market-data/by-type", &query, "Quote fetch failed")
            .await?;

        for quote in data.data.items {
            let Some(symbol) = quote.symbol else {
                continue;
            };
            let price = quote
                .last
                .as_ref()
                .or(quote.mark.as_ref())
                .and_then(|v| number_text("last", v).ok())
                .and_then(|text| parse_decimal("last", &text).ok());
            match price {
                Some(price) => quotes.insert(&symbol, price),
                None => warn!("[QUOTES] No usable price for {}", symbol),
            }
        }

        info!("[QUOTES] {} of {} symbols quoted", quotes.len(), symbols.len());
        Ok(quotes)
    }
}

async fn parse_body<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> TastytradeClient {
        TastytradeClient::new(server.base_url(), Duration::from_secs(5)).unwrap()
    }

    fn session() -> Session {
        Session {
            login: "trader".into(),
            session_token: "sess-abc".into(),
            remember_token: None,
        }
    }

    #[tokio::test]
    async fn test_login_with_password() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/sessions").json_body(json!({
                    "login": "trader",
                    "password": "hunter2",
                    "remember-me": true
                }));
                then.status(201).json_body(json!({
                    "data": {
                        "session-token": "sess-abc",
                        "remember-token": "rem-xyz",
                        "user": { "username": "trader" }
                    },
                    "context": "/sessions"
                }));
            })
            .await;

        let session = client(&server)
            .login(&Credentials::Password {
                login: "trader".into(),
                password: "hunter2".into(),
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(session.session_token, "sess-abc");
        assert_eq!(session.remember_token.as_deref(), Some("rem-xyz"));
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/sessions");
                then.status(401).json_body(json!({"error": {"code": "invalid_credentials"}}));
            })
            .await;

        let err = client(&server)
            .login(&Credentials::RememberToken {
                login: "trader".into(),
                token: "stale".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidCredentials));
        assert_eq!(err.to_string(), "Invalid credentials");
    }

    #[tokio::test]
    async fn test_login_server_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/sessions");
                then.status(503);
            })
            .await;

        let err = client(&server)
            .login(&Credentials::Password {
                login: "trader".into(),
                password: "pw".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::LoginFailed(503)));
    }

    #[tokio::test]
    async fn test_snapshot() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/customers/me/accounts")
                    .header("Authorization", "sess-abc");
                then.status(200).json_body(json!({
                    "data": { "items": [
                        { "account": { "account-number": "5WT00001" }, "authority-level": "owner" }
                    ]}
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/accounts/5WT00001/balances");
                then.status(200).json_body(json!({
                    "data": { "net-liquidating-value": "100000.5", "cash-balance": "1.0" }
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/accounts/5WT00001/positions");
                then.status(200).json_body(json!({
                    "data": { "items": [
                        {
                            "symbol": "/ESZ5",
                            "instrument-type": "Future",
                            "underlying-symbol": "/ES",
                            "quantity": "2",
                            "quantity-direction": "Long",
                            "multiplier": 50
                        },
                        {
                            "symbol": "/ZBU5",
                            "instrument-type": "Future",
                            "underlying-symbol": "/ZB",
                            "quantity": 1,
                            "quantity-direction": "Short",
                            "multiplier": "1000.0"
                        },
                        {
                            "symbol": "AAPL",
                            "instrument-type": "Equity",
                            "quantity": "100",
                            "quantity-direction": "Long"
                        }
                    ]}
                }));
            })
            .await;

        let snapshot = client(&server).snapshot(&session()).await.unwrap();
        assert_eq!(snapshot.account_number, "5WT00001");
        assert_eq!(snapshot.net_liquidating_value, 100000.5);
        assert_eq!(snapshot.positions.len(), 2);

        let es = &snapshot.positions[0];
        assert_eq!(es.root, "/ES");
        assert_eq!(es.quantity, 2);
        assert_eq!(es.multiplier, Some(50.0));
        assert_eq!(es.underlying.as_deref(), Some("/ES"));

        let zb = &snapshot.positions[1];
        assert_eq!(zb.root, "/ZB");
        assert_eq!(zb.quantity, -1);
    }

    #[tokio::test]
    async fn test_contract_value_sizes_position() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/customers/me/accounts");
                then.status(200).json_body(json!({
                    "data": { "items": [ { "account": { "account-number": "5WT00001" } } ] }
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/accounts/5WT00001/balances");
                then.status(200).json_body(json!({
                    "data": { "net-liquidating-value": "50000" }
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/accounts/5WT00001/positions");
                then.status(200).json_body(json!({
                    "data": { "items": [
                        {
                            "symbol": "/HEZ5",
                            "instrument-type": "Future",
                            "quantity": "3",
                            "quantity-direction": "Long",
                            "contract-value": "400"
                        },
                        {
                            "symbol": "/LEZ5",
                            "instrument-type": "Future",
                            "quantity": "1",
                            "quantity-direction": "Long",
                            "contract-value": 0,
                            "multiplier": "400"
                        },
                        {
                            "symbol": "/GFZ5",
                            "instrument-type": "Future",
                            "quantity": "1",
                            "quantity-direction": "Long",
                            "contract-value": "500",
                            "multiplier": "1"
                        }
                    ]}
                }));
            })
            .await;

        let snapshot = client(&server).snapshot(&session()).await.unwrap();
        let sizes: Vec<Option<f64>> = snapshot.positions.iter().map(|p| p.multiplier).collect();
        assert_eq!(sizes, vec![Some(400.0), Some(400.0), Some(500.0)]);
    }

    #[tokio::test]
    async fn test_no_account() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/customers/me/accounts");
                then.status(200).json_body(json!({ "data": { "items": [] } }));
            })
            .await;

        let err = client(&server).snapshot(&session()).await.unwrap_err();
        assert!(matches!(err, GatewayError::NoAccount));
    }

    #[tokio::test]
    async fn test_balance_failure_names_the_call() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/accounts/5WT00001/balances");
                then.status(500);
            })
            .await;

        let err = client(&server)
            .net_liquidating_value(&session(), "5WT00001")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Balance fetch failed (status 500)");
    }

    #[tokio::test]
    async fn test_non_numeric_quantity_fails_fast() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/accounts/5WT00001/positions");
                then.status(200).json_body(json!({
                    "data": { "items": [
                        { "symbol": "/ESZ5", "instrument-type": "Future", "quantity": "two" }
                    ]}
                }));
            })
            .await;

        let err = client(&server)
            .futures_positions(&session(), "5WT00001")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Parse(ParseError::InvalidNumber {
                field: "quantity",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_missing_nlv_fails_fast() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/accounts/5WT00001/balances");
                then.status(200).json_body(json!({ "data": {} }));
            })
            .await;

        let err = client(&server)
            .net_liquidating_value(&session(), "5WT00001")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Parse(ParseError::MissingField("net-liquidating-value"))
        ));
    }

    #[tokio::test]
    async fn test_live_quotes() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/market-data/by-type")
                    .query_param("future", "/ESZ5")
                    .query_param("future", "/NQZ5");
                then.status(200).json_body(json!({
                    "data": { "items": [
                        { "symbol": "/ESZ5", "last": "4510.25", "mark": "4510.0" },
                        { "symbol": "/NQZ5", "mark": 15800.5 },
                        { "symbol": "/CLZ5", "last": null }
                    ]}
                }));
            })
            .await;

        let symbols = vec!["/ESZ5".to_string(), "/NQZ5".to_string()];
        let quotes = client(&server)
            .live_quotes(&session(), &symbols)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(quotes.get("/ESZ5"), Some(4510.25));
        assert_eq!(quotes.get("/NQZ5"), Some(15800.5));
        assert_eq!(quotes.get("/CLZ5"), None);
    }

    #[tokio::test]
    async fn test_live_quotes_skips_request_without_symbols() {
        let server = MockServer::start_async().await;
        let quotes = client(&server).live_quotes(&session(), &[]).await.unwrap();
        assert!(quotes.is_empty());
    }
}
