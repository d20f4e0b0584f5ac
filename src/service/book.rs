// ============================================================================
// Order books & exchange stream messages
// ============================================================================
//
// Binance combined stream:
//   {"stream":"xrpusdt@trade","data":{"s":"XRPUSDT","p":"0.61","q":"120","T":1700000000000,"m":false}}
//   {"stream":"xrpusdt@depth@100ms","data":{"s":"XRPUSDT","b":[["0.60","10"]],"a":[["0.62","0"]]}}
// Kraken v1:
//   [channelID, {"as"|"a": [[price, volume, ts]], "bs"|"b": [...]}, ..., "book-100", "XRP/USD"]
//   [channelID, [[price, volume, time, side, type, misc]], "trade", "XRP/USD"]
//
// A level with quantity 0 removes that price.

use crate::feed::{Action, Exchange};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Bids,
    Asks,
}

/// Price levels keyed by the exchange's own price string, so updates replace
/// exactly the level they name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBook {
    bids: HashMap<String, f64>,
    asks: HashMap<String, f64>,
}

impl OrderBook {
    /// Apply at most `max_levels` updates to one side.
    pub fn apply(&mut self, side: Side, levels: &[(String, f64)], max_levels: usize) {
        let book = match side {
            Side::Bids => &mut self.bids,
            Side::Asks => &mut self.asks,
        };
        for (price, qty) in levels.iter().take(max_levels) {
            if *qty == 0.0 {
                book.remove(price);
            } else {
                book.insert(price.clone(), *qty);
            }
        }
    }

    pub fn best_bid(&self) -> Option<f64> {
        best(&self.bids, f64::max)
    }

    pub fn best_ask(&self) -> Option<f64> {
        best(&self.asks, f64::min)
    }

    pub fn bid_size(&self) -> f64 {
        self.bids.values().sum()
    }

    pub fn ask_size(&self) -> f64 {
        self.asks.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Top `n` levels per side: bids high to low, asks low to high.
    pub fn depth(&self, n: usize) -> BookDepth {
        let mut bids = levels(&self.bids);
        bids.sort_by(|a, b| b[0].total_cmp(&a[0]));
        bids.truncate(n);

        let mut asks = levels(&self.asks);
        asks.sort_by(|a, b| a[0].total_cmp(&b[0]));
        asks.truncate(n);

        BookDepth { bids, asks }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookDepth {
    pub bids: Vec<[f64; 2]>,
    pub asks: Vec<[f64; 2]>,
}

fn best(side: &HashMap<String, f64>, pick: fn(f64, f64) -> f64) -> Option<f64> {
    side.keys()
        .filter_map(|p| p.parse::<f64>().ok())
        .filter(|p| p.is_finite() && *p > 0.0)
        .reduce(pick)
}

fn levels(side: &HashMap<String, f64>) -> Vec<[f64; 2]> {
    side.iter()
        .filter_map(|(p, q)| p.parse::<f64>().ok().map(|p| [p, *q]))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub exchange: Exchange,
    pub symbol: String,
    pub price: f64,
    pub qty: f64,
    pub side: Action,
    /// Epoch milliseconds.
    pub ts: i64,
}

impl Trade {
    pub fn usd(&self) -> f64 {
        self.price * self.qty
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Trade(Trade),
    Depth {
        exchange: Exchange,
        symbol: String,
        bids: Vec<(String, f64)>,
        asks: Vec<(String, f64)>,
    },
}

/// One message of the Binance combined stream. Anything else is `None`.
pub fn parse_binance(msg: &Value) -> Option<StreamEvent> {
    let stream = msg.get("stream")?.as_str()?;
    let data = msg.get("data")?;
    let symbol = data.get("s")?.as_str()?.to_uppercase();

    if stream.contains("@trade") {
        let price = number(data.get("p")?)?;
        let qty = number(data.get("q")?)?;
        // "m": the buyer was the maker, so the taker sold.
        let side = match data.get("m").and_then(Value::as_bool) {
            Some(true) => Action::Sell,
            Some(false) => Action::Buy,
            None => Action::Hold,
        };
        return Some(StreamEvent::Trade(Trade {
            exchange: Exchange::Binance,
            symbol,
            price,
            qty,
            side,
            ts: data.get("T").and_then(Value::as_i64).unwrap_or_default(),
        }));
    }

    if stream.contains("@depth") {
        let side = |short: &str, long: &str| {
            data.get(long)
                .or_else(|| data.get(short))
                .map(level_list)
                .unwrap_or_default()
        };
        return Some(StreamEvent::Depth {
            exchange: Exchange::Binance,
            symbol,
            bids: side("b", "bids"),
            asks: side("a", "asks"),
        });
    }
    None
}

/// One Kraken v1 channel message. Events and heartbeats (objects) yield nothing.
pub fn parse_kraken(msg: &Value) -> Vec<StreamEvent> {
    let Some(arr) = msg.as_array() else {
        return Vec::new();
    };
    if arr.len() < 4 {
        return Vec::new();
    }
    let (Some(channel), Some(pair)) = (arr[arr.len() - 2].as_str(), arr[arr.len() - 1].as_str())
    else {
        return Vec::new();
    };
    let payload = &arr[1..arr.len() - 2];

    if channel == "trade" {
        let Some(trades) = payload.first().and_then(Value::as_array) else {
            return Vec::new();
        };
        return trades
            .iter()
            .filter_map(|t| kraken_trade(pair, t))
            .map(StreamEvent::Trade)
            .collect();
    }

    if channel.starts_with("book") {
        let mut bids = Vec::new();
        let mut asks = Vec::new();
        for part in payload.iter().filter_map(Value::as_object) {
            for key in ["as", "a"] {
                asks.extend(part.get(key).map(level_list).unwrap_or_default());
            }
            for key in ["bs", "b"] {
                bids.extend(part.get(key).map(level_list).unwrap_or_default());
            }
        }
        return vec![StreamEvent::Depth {
            exchange: Exchange::Kraken,
            symbol: pair.to_string(),
            bids,
            asks,
        }];
    }
    Vec::new()
}

fn kraken_trade(pair: &str, raw: &Value) -> Option<Trade> {
    let t = raw.as_array()?;
    let price = number(t.first()?)?;
    let qty = number(t.get(1)?)?;
    let ts = t.get(2).and_then(number).unwrap_or_default();
    let side = match t.get(3).and_then(Value::as_str) {
        Some("b") => Action::Buy,
        Some("s") => Action::Sell,
        _ => Action::Hold,
    };
    (price > 0.0 && qty > 0.0).then(|| Trade {
        exchange: Exchange::Kraken,
        symbol: pair.to_string(),
        price,
        qty,
        side,
        ts: (ts * 1000.0) as i64,
    })
}

/// `[[price, qty, ...], ...]` with string or numeric entries. The price keeps
/// its original text.
fn level_list(value: &Value) -> Vec<(String, f64)> {
    value
        .as_array()
        .map(|levels| {
            levels
                .iter()
                .filter_map(|level| {
                    let level = level.as_array()?;
                    let price = match level.first()? {
                        Value::String(s) => s.clone(),
                        Value::Number(n) => n.to_string(),
                        _ => return None,
                    };
                    Some((price, number(level.get(1)?)?))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn number(value: &Value) -> Option<f64> {
    let parsed: Option<f64> = match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lv(levels: &[(&str, f64)]) -> Vec<(String, f64)> {
        levels.iter().map(|(p, q)| (p.to_string(), *q)).collect()
    }

    #[test]
    fn test_book_updates_and_removals() {
        let mut book = OrderBook::default();
        book.apply(Side::Bids, &lv(&[("0.60", 10.0), ("0.59", 5.0)]), 100);
        book.apply(Side::Asks, &lv(&[("0.62", 4.0), ("0.63", 1.0)]), 100);
        assert_eq!(book.best_bid(), Some(0.60));
        assert_eq!(book.best_ask(), Some(0.62));
        assert_eq!(book.bid_size(), 15.0);

        book.apply(Side::Bids, &lv(&[("0.60", 0.0)]), 100);
        assert_eq!(book.best_bid(), Some(0.59));

        let depth = book.depth(1);
        assert_eq!(depth.bids, vec![[0.59, 5.0]]);
        assert_eq!(depth.asks, vec![[0.62, 4.0]]);
    }

    #[test]
    fn test_level_cap() {
        let mut book = OrderBook::default();
        book.apply(Side::Asks, &lv(&[("1", 1.0), ("2", 1.0), ("3", 1.0)]), 2);
        assert_eq!(book.depth(10).asks.len(), 2);
    }

    #[test]
    fn test_parse_binance_trade_and_depth() {
        let trade = json!({
            "stream": "xrpusdt@trade",
            "data": { "s": "XRPUSDT", "p": "0.61", "q": "200000", "T": 1_700_000_000_000i64, "m": true }
        });
        match parse_binance(&trade) {
            Some(StreamEvent::Trade(t)) => {
                assert_eq!(t.symbol, "XRPUSDT");
                assert_eq!(t.side, Action::Sell);
                assert!((t.usd() - 122_000.0).abs() < 1e-6);
            }
            other => panic!("unexpected {other:?}"),
        }

        let depth = json!({
            "stream": "xrpusdt@depth@100ms",
            "data": { "s": "XRPUSDT", "b": [["0.60", "10"]], "a": [["0.62", "0"]] }
        });
        assert_eq!(
            parse_binance(&depth),
            Some(StreamEvent::Depth {
                exchange: Exchange::Binance,
                symbol: "XRPUSDT".to_string(),
                bids: lv(&[("0.60", 10.0)]),
                asks: lv(&[("0.62", 0.0)]),
            })
        );

        assert_eq!(parse_binance(&json!({ "result": null, "id": 1 })), None);
    }

    #[test]
    fn test_parse_kraken_book_and_trades() {
        let snapshot = json!([
            42,
            { "as": [["0.6210", "100.0", "1700000000.1"]], "bs": [["0.6200", "300.0", "1700000000.1"]] },
            "book-100",
            "XRP/USD"
        ]);
        let events = parse_kraken(&snapshot);
        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::Depth { symbol, bids, asks, .. } => {
                assert_eq!(symbol, "XRP/USD");
                assert_eq!(bids, &lv(&[("0.6200", 300.0)]));
                assert_eq!(asks, &lv(&[("0.6210", 100.0)]));
            }
            other => panic!("unexpected {other:?}"),
        }

        let split = json!([42, { "a": [["0.63", "1", "1"]] }, { "b": [["0.61", "2", "1"]] }, "book-100", "XRP/USD"]);
        match &parse_kraken(&split)[0] {
            StreamEvent::Depth { bids, asks, .. } => {
                assert_eq!(bids.len(), 1);
                assert_eq!(asks.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }

        let trades = json!([
            7,
            [["0.6205", "50000", "1700000000.5", "b", "m", ""], ["0", "1", "1", "s", "m", ""]],
            "trade",
            "XRP/USD"
        ]);
        let events = parse_kraken(&trades);
        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::Trade(t) => {
                assert_eq!(t.side, Action::Buy);
                assert_eq!(t.ts, 1_700_000_000_500);
            }
            other => panic!("unexpected {other:?}"),
        }

        assert!(parse_kraken(&json!({ "event": "heartbeat" })).is_empty());
    }
}
