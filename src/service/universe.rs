// ============================================================================
// Tradable universe: Binance spot USD(T) symbols, Kraken USD(T) pairs
// ============================================================================

use super::MarketState;
use crate::error::FeedError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

const BINANCE_QUOTES: [&str; 2] = ["USDT", "USD"];
/// Kraken reports legacy fiat quotes with a `Z` prefix.
const KRAKEN_QUOTES: [&str; 3] = ["USD", "ZUSD", "USDT"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Universe {
    /// Binance symbols, e.g. `XRPUSDT`.
    pub binance: Vec<String>,
    /// Kraken websocket names, e.g. `XRP/USD`.
    pub kraken: Vec<String>,
    pub ts: Option<DateTime<Utc>>,
}

/// `exchangeInfo`: symbols that are `TRADING` against a USD quote.
pub fn parse_binance_symbols(body: &Value) -> Vec<String> {
    body["symbols"]
        .as_array()
        .map(|symbols| {
            symbols
                .iter()
                .filter(|s| s["status"] == "TRADING")
                .filter(|s| {
                    s["quoteAsset"]
                        .as_str()
                        .is_some_and(|q| BINANCE_QUOTES.contains(&q))
                })
                .filter_map(|s| s["symbol"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// `AssetPairs`: the websocket name of every USD-quoted pair that has one.
pub fn parse_kraken_pairs(body: &Value) -> Vec<String> {
    let Some(result) = body["result"].as_object() else {
        return Vec::new();
    };
    let mut pairs: Vec<String> = result
        .values()
        .filter(|v| v["quote"].as_str().is_some_and(|q| KRAKEN_QUOTES.contains(&q)))
        .filter_map(|v| v["wsname"].as_str().map(str::to_string))
        .collect();
    pairs.sort();
    pairs
}

async fn get_json(client: &reqwest::Client, url: &str) -> Result<Value, FeedError> {
    let response = client.get(url).timeout(Duration::from_secs(30)).send().await?;
    if !response.status().is_success() {
        return Err(FeedError::Status {
            status: response.status().as_u16(),
            url: url.to_string(),
        });
    }
    Ok(response.json().await?)
}

pub async fn fetch_universe(
    client: &reqwest::Client,
    binance_rest: &str,
    kraken_rest: &str,
) -> Result<Universe, FeedError> {
    let binance = get_json(client, &format!("{binance_rest}/api/v3/exchangeInfo")).await?;
    let kraken = get_json(client, &format!("{kraken_rest}/0/public/AssetPairs")).await?;
    Ok(Universe {
        binance: parse_binance_symbols(&binance),
        kraken: parse_kraken_pairs(&kraken),
        ts: Some(Utc::now()),
    })
}

/// Refresh the universe every `every`. A failed sync keeps the previous one.
pub async fn run_universe_sync(
    state: MarketState,
    client: reqwest::Client,
    binance_rest: String,
    kraken_rest: String,
    every: Duration,
) {
    loop {
        match fetch_universe(&client, &binance_rest, &kraken_rest).await {
            Ok(universe) => {
                info!(
                    binance = universe.binance.len(),
                    kraken = universe.kraken.len(),
                    "universe synced"
                );
                state.set_universe(universe);
            }
            Err(e) => {
                warn!(error = %e, "universe sync failed");
                state.record_error("universe_sync", e.to_string());
            }
        }
        sleep(every).await;
    }
}
