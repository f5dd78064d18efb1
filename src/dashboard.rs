//! One dashboard refresh: session -> account snapshot -> prices -> exposure -> risk -> render.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ProxyMapping;
use crate::error::GatewayError;
use crate::exposure::{aggregate, Exposure, NotionalStatus};
use crate::finnhub::FinnhubClient;
use crate::pricing::{LiveQuotes, PriceSources, ProxyQuotes};
use crate::render::Render;
use crate::risk::NotionalResult;
use crate::sizing::size_of;
use crate::store::{ManualPriceStore, ManualPrices, RememberedSession, SessionStore};
use crate::tastytrade::{Credentials, Session, TastytradeClient};
use crate::types::{AccountSnapshot, NetPosition};

/// Everything a renderer needs for one refresh.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub as_of: DateTime<Utc>,
    pub account_number: String,
    pub net_liquidating_value: f64,
    pub net_position: NetPosition,
    pub status: NotionalStatus,
    pub source_label: Option<String>,
    pub result: NotionalResult,
    pub exposure: Exposure,
}

impl DashboardView {
    /// Pure computation over a snapshot and the price sources of this refresh.
    pub fn build(snapshot: &AccountSnapshot, sources: &PriceSources<'_>) -> Self {
        let exposure = aggregate(&snapshot.positions, |s| sources.resolve(s), size_of);
        let result = NotionalResult::from_exposure(&exposure, snapshot.net_liquidating_value);

        Self {
            as_of: Utc::now(),
            account_number: snapshot.account_number.clone(),
            net_liquidating_value: snapshot.net_liquidating_value,
            net_position: exposure.net_position(),
            status: exposure.status(),
            source_label: exposure.source_label(),
            result,
            exposure,
        }
    }
}

/// Where prices may come from on a refresh
#[derive(Debug, Clone)]
pub struct PricingOptions {
    pub live_quotes: bool,
    pub proxy: Option<(FinnhubClient, Vec<ProxyMapping>)>,
}

pub struct Dashboard<R: Render> {
    client: TastytradeClient,
    sessions: SessionStore,
    prices: ManualPriceStore,
    pricing: PricingOptions,
    renderer: R,
}

impl<R: Render> Dashboard<R> {
    pub fn new(
        client: TastytradeClient,
        sessions: SessionStore,
        prices: ManualPriceStore,
        pricing: PricingOptions,
        renderer: R,
    ) -> Self {
        Self {
            client,
            sessions,
            prices,
            pricing,
            renderer,
        }
    }

    /// Log in with a password, remember the session and refresh.
    pub async fn login(&mut self, login: String, password: String) -> Result<DashboardView> {
        let session = self
            .client
            .login(&Credentials::Password { login, password })
            .await?;
        self.remember(&session)?;
        self.refresh_with(&session).await
    }

    /// Refresh using the remembered session.
    pub async fn refresh(&mut self) -> Result<DashboardView> {
        let remembered = self.sessions.load()?.ok_or(GatewayError::NoSession)?;
        let session = self
            .client
            .login(&Credentials::RememberToken {
                login: remembered.login,
                token: remembered.remember_token,
            })
            .await
            .context("remembered session rejected, run `login` again")?;
        self.remember(&session)?;
        self.refresh_with(&session).await
    }

    /// Taking `&mut self` keeps refreshes from overlapping.
    async fn refresh_with(&mut self, session: &Session) -> Result<DashboardView> {
        let snapshot = self.client.snapshot(session).await?;

        let live = if self.pricing.live_quotes && !snapshot.positions.is_empty() {
            let symbols: Vec<String> = snapshot.positions.iter().map(|p| p.symbol.clone()).collect();
            match self.client.live_quotes(session, &symbols).await {
                Ok(quotes) => Some(quotes),
                Err(e) => {
                    warn!("[QUOTES] Live quotes unavailable, using manual prices: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let proxy = match &self.pricing.proxy {
            Some((finnhub, mappings)) if !snapshot.positions.is_empty() => {
                let mut roots: Vec<String> = snapshot.positions.iter().map(|p| p.root.clone()).collect();
                roots.sort();
                roots.dedup();
                let quotes = finnhub.proxy_quotes(mappings, &roots).await;
                debug!("[PROXY] {} roots priced by proxy", quotes.len());
                Some(quotes)
            }
            _ => None,
        };

        // Read after the last await so edits made during the refresh are picked up.
        let manual = self.prices.load()?;
        let view = build_view(&snapshot, &manual, live.as_ref(), proxy.as_ref());

        info!(
            "[DASHBOARD] notional {:.2} | leverage {:.2}x | {} | {} unpriced",
            view.result.total_notional,
            view.result.leverage,
            view.result.risk.tier.label(),
            view.exposure.unresolved_count
        );

        self.renderer.render(&view)?;
        Ok(view)
    }

    fn remember(&self, session: &Session) -> Result<()> {
        if let Some(token) = &session.remember_token {
            self.sessions.save(&RememberedSession {
                login: session.login.clone(),
                remember_token: token.clone(),
            })?;
        }
        Ok(())
    }
}

pub fn build_view(
    snapshot: &AccountSnapshot,
    manual: &ManualPrices,
    live: Option<&LiveQuotes>,
    proxy: Option<&ProxyQuotes>,
) -> DashboardView {
    let mut sources = PriceSources::manual_only(manual);
    if let Some(live) = live {
        sources = sources.with_live(live);
    }
    if let Some(proxy) = proxy {
        sources = sources.with_proxy(proxy);
    }
    DashboardView::build(snapshot, &sources)
}
