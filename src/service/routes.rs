// ============================================================================
// Market signal service HTTP API
// ============================================================================
//
// GET /health                         counts + recent errors
// GET /universe                       { binance, kraken, ts }
// GET /books?symbol=XRP               depth of every XRP book
// GET /last                           latest trades, newest first
// GET /signal?symbol=&min_usd=        spread recommendation + whale trades
// GET /alerts                         { ok, alerts }

use super::book::Trade;
use super::MarketState;
use crate::config::ServiceConfig;
use crate::feed::Exchange;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use warp::{Filter, Rejection, Reply};

pub const BOOK_LEVELS: usize = 10;
pub const LAST_TRADES: usize = 50;
pub const WHALE_LIMIT: usize = 50;

/// What `/signal` answers with when the query names nothing.
#[derive(Debug, Clone)]
pub struct SignalDefaults {
    pub symbol: String,
    pub spread_threshold: f64,
    pub whale_min_usd: f64,
}

impl From<&ServiceConfig> for SignalDefaults {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            symbol: config.signal_symbol.clone(),
            spread_threshold: config.spread_threshold,
            whale_min_usd: config.whale_min_usd,
        }
    }
}

fn whale_json(trade: &Trade) -> Value {
    json!({
        "symbol": trade.symbol,
        "price": trade.price,
        "qty": trade.qty,
        "usd": trade.usd(),
        "side": trade.side,
        "price_venue": trade.exchange,
        "t": trade.ts,
    })
}

/// Spread on the Binance book for `symbol`. BUY when the spread is wider than
/// `spread_threshold`, else SELL. Without a quoted book the price fields are
/// null and only the whales are reported.
pub fn signal(state: &MarketState, symbol: &str, spread_threshold: f64, min_usd: f64) -> Value {
    let symbol = symbol.trim().to_uppercase();
    let book = state.book(&super::book_key(Exchange::Binance, &symbol));
    let best_bid = book.as_ref().and_then(|b| b.best_bid());
    let best_ask = book.as_ref().and_then(|b| b.best_ask());

    let (spread, recommendation) = match (best_bid, best_ask) {
        (Some(bid), Some(ask)) => {
            let spread = ((ask - bid) * 1e6).round() / 1e6;
            let call = if spread > spread_threshold { "BUY" } else { "SELL" };
            (Some(spread), Some(call))
        }
        _ => (None, None),
    };

    let whales: Vec<Value> = state
        .whales(min_usd, WHALE_LIMIT)
        .iter()
        .map(whale_json)
        .collect();

    json!({
        "symbol": symbol,
        "best_bid": best_bid,
        "best_ask": best_ask,
        "spread": spread,
        "recommendation": recommendation,
        "whales": whales,
        "ts": Utc::now().timestamp_millis(),
    })
}

pub fn routes(
    state: MarketState,
    defaults: SignalDefaults,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let state_filter = warp::any().map(move || state.clone());
    let defaults_filter = warp::any().map(move || defaults.clone());

    let health = warp::path!("health")
        .and(warp::get())
        .and(state_filter.clone())
        .map(|state: MarketState| warp::reply::json(&state.health()));

    let universe = warp::path!("universe")
        .and(warp::get())
        .and(state_filter.clone())
        .map(|state: MarketState| warp::reply::json(&state.universe()));

    let books = warp::path!("books")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(state_filter.clone())
        .map(|query: HashMap<String, String>, state: MarketState| {
            let symbol = query
                .get("symbol")
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "XRP".to_string());
            let books = state.books_for(&symbol, BOOK_LEVELS);
            warp::reply::json(&json!({ "symbol": symbol, "books": books }))
        });

    let last = warp::path!("last")
        .and(warp::get())
        .and(state_filter.clone())
        .map(|state: MarketState| {
            warp::reply::json(&json!({ "trades": state.recent_trades(LAST_TRADES) }))
        });

    let signal_route = warp::path!("signal")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(state_filter.clone())
        .and(defaults_filter)
        .map(
            |query: HashMap<String, String>, state: MarketState, defaults: SignalDefaults| {
                let symbol = query
                    .get("symbol")
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or(&defaults.symbol);
                let min_usd = query
                    .get("min_usd")
                    .and_then(|v| v.trim().parse::<f64>().ok())
                    .filter(|v| v.is_finite())
                    .unwrap_or(defaults.whale_min_usd);
                warp::reply::json(&signal(&state, symbol, defaults.spread_threshold, min_usd))
            },
        );

    let alerts = warp::path!("alerts")
        .and(warp::get())
        .and(state_filter)
        .map(|state: MarketState| warp::reply::json(&json!({ "ok": true, "alerts": state.alerts() })));

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "OPTIONS"]);

    health
        .or(universe)
        .or(books)
        .or(last)
        .or(signal_route)
        .or(alerts)
        .with(cors)
        .with(warp::reply::with::header("access-control-allow-origin", "*"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{Action, SignalSnapshot};
    use crate::service::book::StreamEvent;
    use crate::service::universe::Universe;
    use warp::http::StatusCode;

    fn body<B: AsRef<[u8]>>(resp: &warp::http::Response<B>) -> Value {
        serde_json::from_slice(resp.body().as_ref()).unwrap()
    }

    fn seeded() -> MarketState {
        let state = MarketState::new(100);
        state.set_universe(Universe {
            binance: vec!["XRPUSDT".to_string()],
            kraken: vec!["XRP/USD".to_string()],
            ts: Some(Utc::now()),
        });
        state.apply(StreamEvent::Depth {
            exchange: Exchange::Binance,
            symbol: "XRPUSDT".to_string(),
            bids: vec![("0.6000".to_string(), 500.0)],
            asks: vec![("0.6200".to_string(), 400.0)],
        });
        for (qty, ts) in [(200_000.0, 1), (10.0, 2)] {
            state.apply(StreamEvent::Trade(Trade {
                exchange: Exchange::Binance,
                symbol: "XRPUSDT".to_string(),
                price: 0.61,
                qty,
                side: Action::Sell,
                ts,
            }));
        }
        state
    }

    fn defaults() -> SignalDefaults {
        SignalDefaults::from(&ServiceConfig::default())
    }

    #[tokio::test]
    async fn test_signal_recommends_on_spread() {
        let routes = routes(seeded(), defaults());

        let resp = warp::test::request().path("/signal").reply(&routes).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let signal = body(&resp);
        assert_eq!(signal["symbol"], "XRPUSDT");
        assert_eq!(signal["spread"], 0.02);
        assert_eq!(signal["recommendation"], "BUY");

        // what the dashboard reads back from it
        let snapshot = SignalSnapshot::from_value(&signal);
        assert_eq!(snapshot.whales.len(), 1);
        assert_eq!(snapshot.whales[0].side, Action::Sell);
        assert_eq!(snapshot.whales[0].price_venue.as_deref(), Some("binance"));

        let signal = body(&warp::test::request().path("/signal?min_usd=1").reply(&routes).await);
        assert_eq!(signal["whales"].as_array().unwrap().len(), 2);

        let signal = body(&warp::test::request().path("/signal?symbol=solusdt").reply(&routes).await);
        assert_eq!(signal["symbol"], "SOLUSDT");
        assert!(signal["recommendation"].is_null());
    }

    #[tokio::test]
    async fn test_books_universe_last_and_health() {
        let routes = routes(seeded(), defaults());

        let books = body(&warp::test::request().path("/books?symbol=xrp").reply(&routes).await);
        assert_eq!(books["symbol"], "XRP");
        assert_eq!(books["books"]["binance:XRPUSDT"]["asks"], json!([[0.62, 400.0]]));

        let books = body(&warp::test::request().path("/books").reply(&routes).await);
        assert_eq!(books["symbol"], "XRP");

        let universe = body(&warp::test::request().path("/universe").reply(&routes).await);
        assert_eq!(universe["kraken"], json!(["XRP/USD"]));

        let last = body(&warp::test::request().path("/last").reply(&routes).await);
        assert_eq!(last["trades"][0]["ts"], 2);

        let health = warp::test::request().path("/health").reply(&routes).await;
        assert_eq!(health.headers()["access-control-allow-origin"], "*");
        let health = body(&health);
        assert_eq!(health["books"], 1);
        assert_eq!(health["universe"]["binance"], 1);

        let alerts = body(&warp::test::request().path("/alerts").reply(&routes).await);
        assert_eq!(alerts, json!({ "ok": true, "alerts": [] }));
    }
}
