use crate::store::Document;
use crate::timestamp::ParsedTime;
use serde::Serialize;
use serde_json::{Map, Value};
use std::cmp::Reverse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    #[default]
    Hold,
}

impl Action {
    /// `"buy"`, `"STRONG_BUY"`, `"Sell"`... anything unrecognised is HOLD.
    pub fn parse(raw: &str) -> Self {
        let upper = raw.to_uppercase();
        if upper.contains("BUY") {
            Self::Buy
        } else if upper.contains("SELL") {
            Self::Sell
        } else {
            Self::Hold
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Hold => "HOLD",
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            Self::Buy => "sig-buy",
            Self::Sell => "sig-sell",
            Self::Hold => "sig-hold",
        }
    }
}

/// One trade or whale alert, whatever collection or endpoint it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalRecord {
    pub coin: String,
    pub action: Action,
    pub confidence: Option<f64>,
    pub price: Option<f64>,
    pub volume: Option<f64>,
    pub reason: String,
    pub time: ParsedTime,
}

const COIN_FIELDS: [&str; 4] = ["coin", "symbol", "sym", "base"];
const ACTION_FIELDS: [&str; 5] = ["action", "signal", "signalType", "recommendation", "side"];
const REASON_FIELDS: [&str; 2] = ["explanation", "reason"];
const TIME_FIELDS: [&str; 4] = ["time", "timestamp", "ts", "t"];

impl SignalRecord {
    /// Build from any JSON object. Non-objects give an empty HOLD record.
    pub fn from_value(value: &Value) -> Self {
        let empty = Map::new();
        let map = value.as_object().unwrap_or(&empty);

        Self {
            coin: first_text(map, &COIN_FIELDS).unwrap_or_default(),
            action: first_text(map, &ACTION_FIELDS)
                .map(|a| Action::parse(&a))
                .unwrap_or_default(),
            confidence: number_field(map, "confidence"),
            price: number_field(map, "price"),
            volume: number_field(map, "volume"),
            reason: first_text(map, &REASON_FIELDS).unwrap_or_default(),
            time: TIME_FIELDS
                .iter()
                .find_map(|k| map.get(*k).filter(|v| !v.is_null()))
                .map(ParsedTime::from_value)
                .unwrap_or_default(),
        }
    }
}

/// Recommendations arrive either as a bare array or as `{items: [...]}`.
pub fn normalize_recs(body: &Value) -> Vec<SignalRecord> {
    let entries: &[Value] = match body {
        Value::Array(entries) => entries.as_slice(),
        Value::Object(map) => map
            .get("items")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
        _ => &[],
    };
    entries.iter().map(SignalRecord::from_value).collect()
}

/// Records from a store snapshot, newest first. Records without a usable time
/// go last, keeping store order among themselves.
pub fn from_documents(docs: &[Document]) -> Vec<SignalRecord> {
    let mut records: Vec<SignalRecord> =
        docs.iter().map(|d| SignalRecord::from_value(&d.data)).collect();
    records.sort_by_key(|r| Reverse(r.time));
    records
}

// ============================================================================
// /signal
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhaleRecord {
    pub symbol: String,
    pub price: Option<f64>,
    pub qty: Option<f64>,
    pub usd: Option<f64>,
    pub side: Action,
    pub price_venue: Option<String>,
}

impl WhaleRecord {
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let symbol = first_text(map, &["symbol", "sym"])?;
        Some(Self {
            symbol,
            price: number_field(map, "price"),
            qty: number_field(map, "qty"),
            usd: number_field(map, "usd"),
            side: first_text(map, &["side", "side_guess"])
                .map(|s| Action::parse(&s))
                .unwrap_or_default(),
            price_venue: first_text(map, &["price_venue"]),
        })
    }
}

/// Body of the upstream `/signal` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SignalSnapshot {
    pub whales: Vec<WhaleRecord>,
    /// Every other top level field, untouched.
    pub extra: Map<String, Value>,
}

impl SignalSnapshot {
    pub fn from_value(body: &Value) -> Self {
        let Some(map) = body.as_object() else {
            return Self::default();
        };
        let whales = map
            .get("whales")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(WhaleRecord::from_value).collect())
            .unwrap_or_default();
        let extra = map
            .iter()
            .filter(|(k, _)| k.as_str() != "whales")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self { whales, extra }
    }
}

fn first_text(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match map.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Numbers, or numeric strings as some feeds send them.
fn number_field(map: &Map<String, Value>, key: &str) -> Option<f64> {
    let number = match map.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}
