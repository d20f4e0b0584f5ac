// ============================================================================
// Configuration: config.json with environment overrides on top
// ============================================================================

use crate::error::ConfigError;
use crate::icon::DEFAULT_ICON_SOURCES;
use crate::store::CollectionQuery;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

pub const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_UPSTREAM: &str = "https://whale-watcher-ai.onrender.com";

/// Listing and recommendation feeds polled by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedEndpoints {
    pub new: String,
    pub top: String,
    pub future: String,
    pub recs: String,
}

impl Default for FeedEndpoints {
    fn default() -> Self {
        Self {
            new: format!("{DEFAULT_UPSTREAM}/liveSignals"),
            top: format!("{DEFAULT_UPSTREAM}/topGainers"),
            future: format!("{DEFAULT_UPSTREAM}/futureGainers"),
            recs: format!("{DEFAULT_UPSTREAM}/getRecommendations"),
        }
    }
}

/// The market signal service: exchange universes, live books and alerts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,

    pub binance_rest: String,
    pub kraken_rest: String,
    pub binance_ws: String,
    pub kraken_ws: String,

    pub universe_refresh_secs: u64,
    pub orderbook_levels: usize,
    pub binance_stream_cap: usize,
    pub kraken_stream_cap: usize,

    pub thresh_orange: u8,
    pub thresh_green: u8,
    pub alert_cooldown_min: u64,

    pub signal_symbol: String,
    pub spread_threshold: f64,
    pub whale_min_usd: f64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 10100,

            binance_rest: "https://api.binance.com".to_string(),
            kraken_rest: "https://api.kraken.com".to_string(),
            binance_ws: "wss://stream.binance.com:9443/stream".to_string(),
            kraken_ws: "wss://ws.kraken.com".to_string(),

            universe_refresh_secs: 900,
            orderbook_levels: 100,
            binance_stream_cap: 200,
            kraken_stream_cap: 100,

            thresh_orange: 80,
            thresh_green: 65,
            alert_cooldown_min: 20,

            signal_symbol: "XRPUSDT".to_string(),
            spread_threshold: 0.01,
            whale_min_usd: 50_000.0,
        }
    }
}

impl ServiceConfig {
    pub fn universe_refresh(&self) -> Duration {
        Duration::from_secs(self.universe_refresh_secs)
    }

    pub fn alert_cooldown(&self) -> Duration {
        Duration::from_secs(self.alert_cooldown_min * 60)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    // 1. Proxy
    pub proxy_host: String,
    pub proxy_port: u16,
    pub upstream: String,
    pub upstream_timeout_ms: u64,

    // 2. Dashboard
    pub dashboard_host: String,
    pub dashboard_port: u16,
    pub poll_interval_ms: u64,
    pub feed_timeout_ms: u64,
    pub feeds: FeedEndpoints,
    pub api_base: String,
    pub price_api_base: String,
    pub whale_min_usd: Option<f64>,

    // 3. Icons
    pub icon_sources: Vec<String>,
    pub icon_probe_timeout_ms: u64,

    // 4. Document store
    pub data_dir: String,
    pub signals_collection: String,

    // 5. Market signal service
    pub service: ServiceConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            proxy_host: "0.0.0.0".to_string(),
            proxy_port: 10000,
            upstream: DEFAULT_UPSTREAM.to_string(),
            upstream_timeout_ms: 15_000,

            dashboard_host: "127.0.0.1".to_string(),
            dashboard_port: 8080,
            poll_interval_ms: 5_000,
            feed_timeout_ms: 10_000,
            feeds: FeedEndpoints::default(),
            api_base: DEFAULT_UPSTREAM.to_string(),
            price_api_base: "https://api.binance.com".to_string(),
            whale_min_usd: None,

            icon_sources: DEFAULT_ICON_SOURCES.iter().map(|s| s.to_string()).collect(),
            icon_probe_timeout_ms: 3_000,

            data_dir: "data".to_string(),
            signals_collection: "whaleSignals".to_string(),

            service: ServiceConfig::default(),
        }
    }
}

impl AppConfig {
    /// File, then process environment, then validation.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = load_config(path).await?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = var("CHENDA_URL") {
            self.upstream = url.trim().to_string();
        }
        if let Some(port) = var("PORT") {
            self.proxy_port = parse_var("PORT", &port)?;
        }
        if let Some(base) = var("CHENDA_API_BASE") {
            self.api_base = base.trim().to_string();
        }
        if let Some(dir) = var("CHENDA_DATA_DIR") {
            self.data_dir = dir.trim().to_string();
        }
        if let Some(collection) = var("CHENDA_SIGNALS_COLLECTION") {
            self.signals_collection = collection.trim().to_string();
        }

        if let Some(secs) = var("UNIVERSE_REFRESH_SECS") {
            self.service.universe_refresh_secs = parse_var("UNIVERSE_REFRESH_SECS", &secs)?;
        }
        if let Some(levels) = var("ORDERBOOK_LEVELS") {
            self.service.orderbook_levels = parse_var("ORDERBOOK_LEVELS", &levels)?;
        }
        if let Some(score) = var("THRESH_ORANGE") {
            self.service.thresh_orange = parse_var("THRESH_ORANGE", &score)?;
        }
        if let Some(score) = var("THRESH_GREEN") {
            self.service.thresh_green = parse_var("THRESH_GREEN", &score)?;
        }
        if let Some(minutes) = var("ALERT_COOLDOWN_MIN") {
            self.service.alert_cooldown_min = parse_var("ALERT_COOLDOWN_MIN", &minutes)?;
        }
        Ok(())
    }

    /// URLs are kept without trailing slashes.
    pub fn normalize(&mut self) {
        for url in [
            &mut self.upstream,
            &mut self.api_base,
            &mut self.price_api_base,
            &mut self.feeds.new,
            &mut self.feeds.top,
            &mut self.feeds.future,
            &mut self.feeds.recs,
            &mut self.service.binance_rest,
            &mut self.service.kraken_rest,
        ] {
            let trimmed = url.trim().trim_end_matches('/').to_string();
            *url = trimmed;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("poll_interval_ms", self.poll_interval_ms),
            ("feed_timeout_ms", self.feed_timeout_ms),
            ("upstream_timeout_ms", self.upstream_timeout_ms),
            ("icon_probe_timeout_ms", self.icon_probe_timeout_ms),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    key,
                    message: "must be greater than 0".to_string(),
                });
            }
        }

        if self.upstream.is_empty() {
            return Err(ConfigError::Invalid {
                key: "upstream",
                message: "must not be empty".to_string(),
            });
        }

        let service = &self.service;
        if service.universe_refresh_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "service.universe_refresh_secs",
                message: "must be greater than 0".to_string(),
            });
        }
        if service.orderbook_levels == 0 {
            return Err(ConfigError::Invalid {
                key: "service.orderbook_levels",
                message: "must be greater than 0".to_string(),
            });
        }
        for (key, score) in [
            ("service.thresh_orange", service.thresh_orange),
            ("service.thresh_green", service.thresh_green),
        ] {
            if score > 100 {
                return Err(ConfigError::Invalid {
                    key,
                    message: format!("score threshold {score} is above 100"),
                });
            }
        }

        self.signals_query()?;
        Ok(())
    }

    pub fn signals_query(&self) -> Result<CollectionQuery, ConfigError> {
        CollectionQuery::parse(&self.signals_collection).map_err(|e| ConfigError::Invalid {
            key: "signals_collection",
            message: e.to_string(),
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn feed_timeout(&self) -> Duration {
        Duration::from_millis(self.feed_timeout_ms)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    pub fn icon_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.icon_probe_timeout_ms)
    }
}

fn parse_var<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        message: format!("cannot parse {raw:?}"),
    })
}

/// Read `path`, writing the defaults there first if it does not exist yet.
pub async fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let default = AppConfig::default();
            save_config(path, &default).await?;
            info!(path = %path.display(), "wrote default config");
            Ok(default)
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    let json = serde_json::to_string_pretty(config)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, json).await?;
    Ok(())
}
