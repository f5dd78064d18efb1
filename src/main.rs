//! Futures Leverage Dashboard
//!
//! Pulls balance and futures positions from a tastytrade account, prices them
//! (live quotes, manual prices or a proxy index), and reports:
//! - Total signed notional exposure
//! - Leverage against net liquidating value
//! - A fixed-breakpoint risk classification

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

mod config;
mod dashboard;
mod error;
mod exposure;
mod finnhub;
mod pricing;
mod render;
mod risk;
mod sizing;
mod store;
mod tastytrade;
mod types;

use dashboard::{Dashboard, PricingOptions};
use finnhub::FinnhubClient;
use render::{JsonRenderer, Render, TerminalRenderer};
use store::{ManualPriceStore, SessionStore};
use tastytrade::TastytradeClient;

#[derive(Debug, Parser)]
#[command(name = "futures-leverage-dashboard", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Log in with username and password, remember the session and show the dashboard
    Login {
        #[arg(long, env = "TASTYTRADE_USERNAME")]
        username: String,
        #[arg(long, env = "TASTYTRADE_PASSWORD", hide_env_values = true)]
        password: String,
        #[command(flatten)]
        show: ShowArgs,
    },
    /// Forget the remembered session
    Logout,
    /// Refresh the dashboard using the remembered session
    Show(ShowArgs),
    /// Manage manual prices
    Prices {
        #[command(subcommand)]
        action: PriceCommand,
    },
}

#[derive(Debug, Args)]
struct ShowArgs {
    /// Skip live quotes and price from the manual table only
    #[arg(long)]
    manual_only: bool,
    /// Print the dashboard as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum PriceCommand {
    /// List saved manual prices
    List,
    /// Save a manual price for a root (e.g. /MES 5010.25)
    Set { symbol: String, price: f64 },
    /// Delete a manual price
    Delete { symbol: String },
    /// Add the default roots at the unset price
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables before clap reads env-backed args
    dotenvy::dotenv().ok();

    // Initialize logging (stderr, so --json output stays clean)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("futures_leverage_dashboard=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let data_dir = config::data_dir();
    let prices = ManualPriceStore::new(&data_dir);
    let sessions = SessionStore::new(&data_dir);

    match cli.command {
        Command::Login {
            username,
            password,
            show,
        } => {
            if username.trim().is_empty() || password.is_empty() {
                anyhow::bail!("Enter both username and password");
            }
            prices.seed_defaults()?;
            let pricing = pricing_options(&show)?;
            if show.json {
                let renderer = JsonRenderer::new(std::io::stdout());
                let mut dash = build_dashboard(sessions, prices, pricing, renderer)?;
                dash.login(username, password).await?;
            } else {
                let renderer = TerminalRenderer::new(std::io::stdout());
                let mut dash = build_dashboard(sessions, prices, pricing, renderer)?;
                dash.login(username, password).await?;
            }
        }
        Command::Logout => {
            if sessions.clear()? {
                info!("[SESSION] Logged out");
            } else {
                warn!("[SESSION] No remembered session");
            }
        }
        Command::Show(show) => {
            prices.seed_defaults()?;
            let pricing = pricing_options(&show)?;
            if show.json {
                let renderer = JsonRenderer::new(std::io::stdout());
                let mut dash = build_dashboard(sessions, prices, pricing, renderer)?;
                dash.refresh().await?;
            } else {
                let renderer = TerminalRenderer::new(std::io::stdout());
                let mut dash = build_dashboard(sessions, prices, pricing, renderer)?;
                dash.refresh().await?;
            }
        }
        Command::Prices { action } => run_price_command(&prices, action)?,
    }

    Ok(())
}

fn build_dashboard<R: Render>(
    sessions: SessionStore,
    prices: ManualPriceStore,
    pricing: PricingOptions,
    renderer: R,
) -> Result<Dashboard<R>> {
    let client = TastytradeClient::new(config::tastytrade_api_url(), config::http_timeout())?;
    Ok(Dashboard::new(client, sessions, prices, pricing, renderer))
}

fn pricing_options(show: &ShowArgs) -> Result<PricingOptions> {
    let proxy = match config::finnhub_api_key() {
        Some(key) if !show.manual_only => {
            let client = FinnhubClient::new(config::finnhub_api_url(), key, config::http_timeout())?;
            Some((client, config::proxy_mappings()?))
        }
        _ => None,
    };

    Ok(PricingOptions {
        live_quotes: !show.manual_only,
        proxy,
    })
}

fn run_price_command(prices: &ManualPriceStore, action: PriceCommand) -> Result<()> {
    match action {
        PriceCommand::List => {
            let table = prices.load()?;
            if table.is_empty() {
                println!("No manual prices saved.");
            }
            for (root, price) in table.iter() {
                if price > pricing::UNSET_PRICE {
                    println!("{root:<8} {price:.2}");
                } else {
                    println!("{root:<8} (not set)");
                }
            }
        }
        PriceCommand::Set { symbol, price } => {
            if symbol.trim().is_empty() || !(price > 0.0) {
                anyhow::bail!("Valid symbol & price required");
            }
            let root = prices.set(&symbol, price)?;
            println!("{root} = {price:.2}");
        }
        PriceCommand::Delete { symbol } => {
            if !prices.delete(&symbol)? {
                warn!("[STORE] No manual price for {}", types::root_symbol(&symbol));
            }
        }
        PriceCommand::Seed => {
            let added = prices.seed_defaults()?;
            println!("Added {added} default roots");
        }
    }
    Ok(())
}
