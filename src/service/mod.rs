// ============================================================================
// Market signal service: the upstream behind the proxy's forwarded routes
// ============================================================================
//
// Tasks:
//  1. universe sync  – exchangeInfo / AssetPairs every `universe_refresh_secs`
//  2. streams        – Binance combined stream, Kraken book + trade channels
//  3. feature engine – mid / imbalance per book, once a second
//  4. alert engine   – scored alerts with a per-key cooldown, every 5 s
// All of them share one `MarketState`.

pub mod alerts;
pub mod book;
pub mod features;
pub mod routes;
pub mod stream;
pub mod universe;

use crate::feed::Exchange;
use crate::symbol::base_asset;
use alerts::{Alert, AlertEngine, ALERT_FEED_CAP, ALERT_WINDOW};
use book::{BookDepth, OrderBook, Side, StreamEvent, Trade};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use features::{Feature, Rings};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};
use universe::Universe;

pub const TRADE_HISTORY: usize = 5000;
pub const ERROR_HISTORY: usize = 100;
pub const FEATURE_TICK: Duration = Duration::from_secs(1);
pub const ALERT_TICK: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize)]
pub struct ServiceError {
    pub source: &'static str,
    pub error: String,
    pub t: DateTime<Utc>,
}

pub fn book_key(exchange: Exchange, symbol: &str) -> String {
    format!("{}:{}", exchange.as_str(), symbol)
}

#[derive(Clone)]
pub struct MarketState {
    universe: Arc<RwLock<Universe>>,
    books: Arc<DashMap<String, OrderBook>>,
    trades: Arc<Mutex<VecDeque<Trade>>>,
    features: Arc<DashMap<String, Feature>>,
    rings: Arc<Mutex<Rings>>,
    alerts: Arc<Mutex<VecDeque<Alert>>>,
    errors: Arc<Mutex<VecDeque<ServiceError>>>,
    max_levels: usize,
}

impl MarketState {
    pub fn new(max_levels: usize) -> Self {
        Self {
            universe: Arc::new(RwLock::new(Universe::default())),
            books: Arc::new(DashMap::new()),
            trades: Arc::new(Mutex::new(VecDeque::new())),
            features: Arc::new(DashMap::new()),
            rings: Arc::new(Mutex::new(Rings::default())),
            alerts: Arc::new(Mutex::new(VecDeque::new())),
            errors: Arc::new(Mutex::new(VecDeque::new())),
            max_levels,
        }
    }

    pub fn max_levels(&self) -> usize {
        self.max_levels
    }

    // ------------------------------------------------------------------------
    // Universe
    // ------------------------------------------------------------------------

    pub fn universe(&self) -> Universe {
        self.universe.read().clone()
    }

    pub fn set_universe(&self, universe: Universe) {
        *self.universe.write() = universe;
    }

    // ------------------------------------------------------------------------
    // Stream events
    // ------------------------------------------------------------------------

    pub fn apply(&self, event: StreamEvent) {
        match event {
            StreamEvent::Trade(trade) => {
                let mut trades = self.trades.lock();
                if trades.len() == TRADE_HISTORY {
                    trades.pop_front();
                }
                trades.push_back(trade);
            }
            StreamEvent::Depth {
                exchange,
                symbol,
                bids,
                asks,
            } => {
                let mut book = self.books.entry(book_key(exchange, &symbol)).or_default();
                book.apply(Side::Bids, &bids, self.max_levels);
                book.apply(Side::Asks, &asks, self.max_levels);
            }
        }
    }

    pub fn book(&self, key: &str) -> Option<OrderBook> {
        self.books.get(key).map(|b| b.clone())
    }

    /// Depth of every book whose base asset is `base`, keyed `exchange:symbol`.
    pub fn books_for(&self, base: &str, levels: usize) -> BTreeMap<String, BookDepth> {
        let base = base.trim().to_uppercase();
        self.books
            .iter()
            .filter(|entry| {
                let symbol = entry.key().split_once(':').map_or("", |(_, s)| s);
                base_asset(symbol) == base
            })
            .map(|entry| (entry.key().clone(), entry.value().depth(levels)))
            .collect()
    }

    /// Newest first.
    pub fn recent_trades(&self, limit: usize) -> Vec<Trade> {
        self.trades.lock().iter().rev().take(limit).cloned().collect()
    }

    /// Trades worth at least `min_usd`, newest first.
    pub fn whales(&self, min_usd: f64, limit: usize) -> Vec<Trade> {
        self.trades
            .lock()
            .iter()
            .rev()
            .filter(|t| t.usd() >= min_usd)
            .take(limit)
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------------
    // Features & alerts
    // ------------------------------------------------------------------------

    /// Recompute every quoted book at `now` (epoch seconds). Returns how many
    /// books had both sides.
    pub fn update_features(&self, now: i64) -> usize {
        let computed: Vec<_> = self
            .books
            .iter()
            .filter_map(|entry| {
                features::compute(entry.value(), now).map(|(f, s)| (entry.key().clone(), f, s))
            })
            .collect();

        let mut rings = self.rings.lock();
        for (key, feature, sample) in &computed {
            rings.push(key, *sample);
            self.features.insert(key.clone(), *feature);
        }
        computed.len()
    }

    pub fn feature(&self, key: &str) -> Option<Feature> {
        self.features.get(key).map(|f| *f)
    }

    /// Score every key with history and append what fires to the alert feed.
    pub fn evaluate_alerts(&self, engine: &mut AlertEngine, now: i64) -> Vec<Alert> {
        let fired: Vec<Alert> = {
            let rings = self.rings.lock();
            rings
                .keys(ALERT_WINDOW)
                .filter_map(|key| {
                    let snap = self.feature(key)?;
                    let history = rings.history(ALERT_WINDOW, key)?;
                    engine.evaluate(key, &snap, history, now)
                })
                .collect()
        };

        if !fired.is_empty() {
            let mut feed = self.alerts.lock();
            feed.extend(fired.iter().cloned());
            while feed.len() > ALERT_FEED_CAP {
                feed.pop_front();
            }
        }
        fired
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().iter().cloned().collect()
    }

    // ------------------------------------------------------------------------
    // Errors & health
    // ------------------------------------------------------------------------

    pub fn record_error(&self, source: &'static str, error: impl Into<String>) {
        let mut errors = self.errors.lock();
        if errors.len() == ERROR_HISTORY {
            errors.pop_front();
        }
        errors.push_back(ServiceError {
            source,
            error: error.into(),
            t: Utc::now(),
        });
    }

    /// Newest first.
    pub fn errors(&self, limit: usize) -> Vec<ServiceError> {
        self.errors.lock().iter().rev().take(limit).cloned().collect()
    }

    pub fn health(&self) -> Value {
        let universe = self.universe.read();
        json!({
            "ok": true,
            "universe": {
                "binance": universe.binance.len(),
                "kraken": universe.kraken.len(),
                "ts": universe.ts,
            },
            "books": self.books.len(),
            "features": self.features.len(),
            "trades": self.trades.lock().len(),
            "alerts": self.alerts.lock().len(),
            "errors": self.errors(10),
        })
    }
}

pub async fn run_feature_engine(state: MarketState) {
    loop {
        let quoted = state.update_features(Utc::now().timestamp());
        debug!(quoted, "features updated");
        sleep(FEATURE_TICK).await;
    }
}

pub async fn run_alert_engine(state: MarketState, mut engine: AlertEngine) {
    loop {
        sleep(ALERT_TICK).await;
        for alert in state.evaluate_alerts(&mut engine, Utc::now().timestamp()) {
            info!(key = %alert.key, score = alert.score, level = ?alert.level, "alert");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::Action;

    fn depth(exchange: Exchange, symbol: &str, bid: (&str, f64), ask: (&str, f64)) -> StreamEvent {
        StreamEvent::Depth {
            exchange,
            symbol: symbol.to_string(),
            bids: vec![(bid.0.to_string(), bid.1)],
            asks: vec![(ask.0.to_string(), ask.1)],
        }
    }

    fn trade(symbol: &str, price: f64, qty: f64, ts: i64) -> StreamEvent {
        StreamEvent::Trade(Trade {
            exchange: Exchange::Binance,
            symbol: symbol.to_string(),
            price,
            qty,
            side: Action::Buy,
            ts,
        })
    }

    #[test]
    fn test_books_by_base_asset() {
        let state = MarketState::new(100);
        state.apply(depth(Exchange::Binance, "XRPUSDT", ("0.60", 1.0), ("0.61", 1.0)));
        state.apply(depth(Exchange::Kraken, "XRP/USD", ("0.59", 1.0), ("0.62", 1.0)));
        state.apply(depth(Exchange::Binance, "SOLUSDT", ("150", 1.0), ("151", 1.0)));

        let books = state.books_for("xrp", 10);
        assert_eq!(
            books.keys().collect::<Vec<_>>(),
            vec!["binance:XRPUSDT", "kraken:XRP/USD"]
        );
        assert_eq!(books["kraken:XRP/USD"].bids, vec![[0.59, 1.0]]);
    }

    #[test]
    fn test_whales_are_filtered_newest_first() {
        let state = MarketState::new(100);
        state.apply(trade("XRPUSDT", 0.6, 100_000.0, 1));
        state.apply(trade("XRPUSDT", 0.6, 10.0, 2));
        state.apply(trade("SOLUSDT", 150.0, 1_000.0, 3));

        let whales = state.whales(50_000.0, 10);
        assert_eq!(whales.len(), 2);
        assert_eq!(whales[0].symbol, "SOLUSDT");
        assert_eq!(state.recent_trades(1)[0].ts, 3);
    }

    #[test]
    fn test_features_feed_alerts_with_cooldown() {
        let state = MarketState::new(100);
        state.apply(depth(Exchange::Binance, "XRPUSDT", ("1.00", 90.0), ("1.01", 10.0)));
        for now in 0..40 {
            assert_eq!(state.update_features(now), 1);
        }
        let feature = state.feature("binance:XRPUSDT").unwrap();
        assert!((feature.imb - 0.9).abs() < 1e-9);

        let mut engine = AlertEngine::new(80, 25, 60);
        let fired = state.evaluate_alerts(&mut engine, 100);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].score, 30);
        assert!(state.evaluate_alerts(&mut engine, 130).is_empty());
        assert_eq!(state.alerts().len(), 1);
    }

    #[test]
    fn test_errors_are_bounded() {
        let state = MarketState::new(100);
        for i in 0..(ERROR_HISTORY + 5) {
            state.record_error("binance_ws", format!("e{i}"));
        }
        let errors = state.errors(usize::MAX);
        assert_eq!(errors.len(), ERROR_HISTORY);
        assert_eq!(errors[0].error, format!("e{}", ERROR_HISTORY + 4));
        assert_eq!(state.health()["errors"].as_array().unwrap().len(), 10);
    }
}
