// ============================================================================
// Exchange websocket workers
// ============================================================================

use super::book::{parse_binance, parse_kraken};
use super::MarketState;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

const RECONNECT_DELAY: Duration = Duration::from_secs(3);
const UNIVERSE_WAIT: Duration = Duration::from_secs(2);

/// `{ws_base}?streams=xrpusdt@trade/xrpusdt@depth@100ms/...` for the first
/// `cap` symbols.
pub fn binance_stream_url(ws_base: &str, symbols: &[String], cap: usize) -> String {
    let streams: Vec<String> = symbols
        .iter()
        .take(cap)
        .map(|s| {
            let s = s.to_lowercase();
            format!("{s}@trade/{s}@depth@100ms")
        })
        .collect();
    format!("{ws_base}?streams={}", streams.join("/"))
}

/// Book and trade subscriptions for the first `cap` pairs.
pub fn kraken_subscriptions(pairs: &[String], cap: usize, depth: usize) -> [Value; 2] {
    let pairs: Vec<&String> = pairs.iter().take(cap).collect();
    [
        json!({ "event": "subscribe", "pair": pairs, "subscription": { "name": "book", "depth": depth } }),
        json!({ "event": "subscribe", "pair": pairs, "subscription": { "name": "trade" } }),
    ]
}

pub async fn run_binance_stream(state: MarketState, ws_base: String, cap: usize) {
    loop {
        let symbols = state.universe().binance;
        if symbols.is_empty() {
            sleep(UNIVERSE_WAIT).await;
            continue;
        }

        let url = binance_stream_url(&ws_base, &symbols, cap);
        info!(symbols = symbols.len().min(cap), "binance stream connecting");
        let mut ws = match connect_async(url.as_str()).await {
            Ok((ws, _)) => ws,
            Err(e) => {
                warn!(error = %e, "binance connect failed, retrying");
                state.record_error("binance_ws", e.to_string());
                sleep(RECONNECT_DELAY).await;
                continue;
            }
        };

        while let Some(msg) = ws.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    warn!(error = %e, "binance read failed, reconnecting");
                    state.record_error("binance_ws", e.to_string());
                    break;
                }
            };
            let Some(value) = text_json(&msg) else {
                continue;
            };
            if let Some(event) = parse_binance(&value) {
                state.apply(event);
            }
        }

        warn!("binance stream ended");
        sleep(RECONNECT_DELAY).await;
    }
}

pub async fn run_kraken_stream(state: MarketState, ws_url: String, cap: usize) {
    loop {
        let pairs = state.universe().kraken;
        if pairs.is_empty() {
            sleep(UNIVERSE_WAIT).await;
            continue;
        }

        info!(pairs = pairs.len().min(cap), "kraken stream connecting");
        let mut ws = match connect_async(ws_url.as_str()).await {
            Ok((ws, _)) => ws,
            Err(e) => {
                warn!(error = %e, "kraken connect failed, retrying");
                state.record_error("kraken_ws", e.to_string());
                sleep(RECONNECT_DELAY).await;
                continue;
            }
        };

        let mut subscribed = true;
        for sub in kraken_subscriptions(&pairs, cap, state.max_levels()) {
            if let Err(e) = ws.send(Message::Text(sub.to_string())).await {
                warn!(error = %e, "kraken subscribe failed, reconnecting");
                state.record_error("kraken_ws", e.to_string());
                subscribed = false;
                break;
            }
        }

        while subscribed {
            let Some(msg) = ws.next().await else {
                break;
            };
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    warn!(error = %e, "kraken read failed, reconnecting");
                    state.record_error("kraken_ws", e.to_string());
                    break;
                }
            };
            if let Some(value) = text_json(&msg) {
                for event in parse_kraken(&value) {
                    state.apply(event);
                }
            }
        }

        warn!("kraken stream ended");
        sleep(RECONNECT_DELAY).await;
    }
}

fn text_json(msg: &Message) -> Option<Value> {
    if !msg.is_text() {
        return None;
    }
    serde_json::from_str(msg.to_text().ok()?).ok()
}
