// ============================================================================
// chenda – entrypoint
// ============================================================================

use chenda::config::{AppConfig, CONFIG_FILE};
use chenda::dashboard::{self, poller, Dashboard};
use chenda::feed::FeedClient;
use chenda::icon::IconResolver;
use chenda::proxy::{self, ProxyContext};
use chenda::server::{self, init_logging, shutdown_signal};
use chenda::service::alerts::AlertEngine;
use chenda::service::routes::SignalDefaults;
use chenda::service::{self, stream, universe, MarketState};
use chenda::store::{DocumentStore, JsonStore};
use chenda::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// Whale signal dashboard and upstream proxy.
#[derive(Debug, Parser)]
#[command(name = "chenda", version, about)]
struct Cli {
    /// Config file; created with defaults when missing.
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Relay /ping /signal /books /last /universe and store POST /alert.
    Proxy {
        #[arg(long)]
        port: Option<u16>,

        /// Upstream base URL (overrides CHENDA_URL and the config file).
        #[arg(long)]
        upstream: Option<String>,
    },
    /// Serve the dashboard page and its API.
    Dashboard {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Stream exchange books and serve /signal /books /last /universe /health /alerts.
    Service {
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    init_logging();
    if let Err(e) = run(Cli::parse()).await {
        error!(error = %e, "chenda stopped");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load(&cli.config).await?;
    info!(config = %cli.config.display(), "config loaded");

    match cli.command {
        Command::Proxy { port, upstream } => {
            if let Some(port) = port {
                config.proxy_port = port;
            }
            if let Some(upstream) = upstream {
                config.upstream = upstream;
                config.normalize();
            }
            run_proxy(config).await
        }
        Command::Dashboard { port } => {
            if let Some(port) = port {
                config.dashboard_port = port;
            }
            run_dashboard(config).await
        }
        Command::Service { port } => {
            if let Some(port) = port {
                config.service.port = port;
            }
            run_service(config).await
        }
    }
}

fn open_store(config: &AppConfig) -> Arc<dyn DocumentStore> {
    info!(data_dir = %config.data_dir, "document store");
    Arc::new(JsonStore::new(&config.data_dir))
}

async fn run_proxy(config: AppConfig) -> Result<()> {
    let ctx = ProxyContext::new(
        reqwest::Client::new(),
        &config.upstream,
        config.upstream_timeout(),
        open_store(&config),
    )?;
    info!(upstream = %ctx.upstream(), "proxy upstream");

    server::serve(
        "proxy",
        proxy::routes(ctx),
        &config.proxy_host,
        config.proxy_port,
        shutdown_signal(),
    )
    .await
}

async fn run_dashboard(config: AppConfig) -> Result<()> {
    let http = reqwest::Client::new();
    let feeds = FeedClient::new(http.clone(), &config.api_base, &config.price_api_base)
        .with_timeout(config.feed_timeout());
    let icons = IconResolver::new(http, config.icon_sources.clone(), config.icon_probe_timeout());
    let store = open_store(&config);
    let query = config.signals_query()?;

    let (signals_tx, signals_rx) = watch::channel(Vec::new());
    let dashboard = Dashboard::new(
        feeds,
        config.feeds.clone(),
        icons,
        config.whale_min_usd,
        signals_rx,
    );

    let subscription = tokio::spawn(poller::run_signal_subscription(store, query, signals_tx));
    let poll = {
        let dashboard = dashboard.clone();
        let interval = config.poll_interval();
        tokio::spawn(async move {
            dashboard.warm_up().await;
            poller::run_poller(dashboard, interval).await;
        })
    };

    let served = server::serve(
        "dashboard",
        dashboard::routes::routes(dashboard),
        &config.dashboard_host,
        config.dashboard_port,
        shutdown_signal(),
    )
    .await;

    poll.abort();
    subscription.abort();
    served
}

async fn run_service(config: AppConfig) -> Result<()> {
    let cfg = config.service;
    let state = MarketState::new(cfg.orderbook_levels);
    let engine = AlertEngine::new(cfg.thresh_orange, cfg.thresh_green, cfg.alert_cooldown().as_secs());

    let tasks = vec![
        tokio::spawn(universe::run_universe_sync(
            state.clone(),
            reqwest::Client::new(),
            cfg.binance_rest.clone(),
            cfg.kraken_rest.clone(),
            cfg.universe_refresh(),
        )),
        tokio::spawn(stream::run_binance_stream(
            state.clone(),
            cfg.binance_ws.clone(),
            cfg.binance_stream_cap,
        )),
        tokio::spawn(stream::run_kraken_stream(
            state.clone(),
            cfg.kraken_ws.clone(),
            cfg.kraken_stream_cap,
        )),
        tokio::spawn(service::run_feature_engine(state.clone())),
        tokio::spawn(service::run_alert_engine(state.clone(), engine)),
    ];

    let served = server::serve(
        "service",
        service::routes::routes(state, SignalDefaults::from(&cfg)),
        &cfg.host,
        cfg.port,
        shutdown_signal(),
    )
    .await;

    for task in tasks {
        task.abort();
    }
    served
}
