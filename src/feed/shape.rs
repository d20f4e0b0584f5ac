use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Kraken,
    Binance,
    Unknown,
}

impl Exchange {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "kraken" => Self::Kraken,
            "binance" => Self::Binance,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kraken => "kraken",
            Self::Binance => "binance",
            Self::Unknown => "unknown",
        }
    }
}

/// Normalised listing feed: ticker symbols per exchange, in feed order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExchangeListing {
    pub kraken: Vec<String>,
    pub binance: Vec<String>,
}

impl ExchangeListing {
    pub fn get(&self, exchange: Exchange) -> &[String] {
        match exchange {
            Exchange::Kraken => &self.kraken,
            Exchange::Binance => &self.binance,
            Exchange::Unknown => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kraken.is_empty() && self.binance.is_empty()
    }

    /// Keep symbols containing `query`, case-insensitive. An empty query keeps all.
    pub fn filtered(&self, query: &str) -> Self {
        let needle = query.trim().to_uppercase();
        if needle.is_empty() {
            return self.clone();
        }
        let keep = |symbols: &[String]| {
            symbols
                .iter()
                .filter(|s| s.to_uppercase().contains(&needle))
                .cloned()
                .collect()
        };
        Self {
            kraken: keep(&self.kraken),
            binance: keep(&self.binance),
        }
    }

    pub fn symbols(&self) -> impl Iterator<Item = &String> {
        self.kraken.iter().chain(self.binance.iter())
    }
}

/// Every listing response shape the upstream functions have been seen to return.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedShape<'a> {
    /// `[{exchange, symbol|base}, ...]`
    Flat(&'a [Value]),
    /// `{kraken: [...], binance: [...]}`
    Partitioned {
        kraken: Option<&'a Value>,
        binance: Option<&'a Value>,
    },
    Empty,
}

impl<'a> FeedShape<'a> {
    pub fn detect(body: &'a Value) -> Self {
        match body {
            Value::Array(entries) => Self::Flat(entries),
            Value::Object(map) => Self::Partitioned {
                kraken: map.get("kraken"),
                binance: map.get("binance"),
            },
            _ => Self::Empty,
        }
    }

    pub fn into_listing(self) -> ExchangeListing {
        match self {
            Self::Flat(entries) => from_flat(entries),
            Self::Partitioned { kraken, binance } => ExchangeListing {
                kraken: from_side(kraken),
                binance: from_side(binance),
            },
            Self::Empty => ExchangeListing::default(),
        }
    }
}

/// Normalise any listing response body.
pub fn normalize_listing(body: &Value) -> ExchangeListing {
    FeedShape::detect(body).into_listing()
}

/// Symbol of a single entry: `symbol`, then `base`, then the entry itself.
pub fn entry_symbol(entry: &Value) -> Option<String> {
    let picked = match entry {
        Value::Object(map) => map
            .get("symbol")
            .filter(|v| is_present(v))
            .or_else(|| map.get("base").filter(|v| is_present(v)))?,
        other => other,
    };
    match picked {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

fn from_flat(entries: &[Value]) -> ExchangeListing {
    let mut listing = ExchangeListing::default();
    for entry in entries {
        let exchange = entry
            .get("exchange")
            .and_then(Value::as_str)
            .map(Exchange::from_label)
            .unwrap_or(Exchange::Unknown);
        let Some(symbol) = entry_symbol(entry) else {
            continue;
        };
        match exchange {
            Exchange::Kraken => listing.kraken.push(symbol),
            Exchange::Binance => listing.binance.push(symbol),
            Exchange::Unknown => {}
        }
    }
    listing
}

fn from_side(side: Option<&Value>) -> Vec<String> {
    side.and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(entry_symbol).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_list_partitions_by_exchange() {
        let body = json!([
            { "exchange": "Kraken", "symbol": "ADAUSDT" },
            { "exchange": "binance", "base": "SOL" }
        ]);
        let listing = normalize_listing(&body);
        assert_eq!(
            serde_json::to_value(&listing).unwrap(),
            json!({ "kraken": ["ADAUSDT"], "binance": ["SOL"] })
        );
    }

    #[test]
    fn test_flat_list_drops_unknown_exchange_and_empty_entries() {
        let body = json!([
            { "exchange": "coinbase", "symbol": "BTCUSD" },
            "XRPUSDT",
            { "exchange": "binance" },
            { "exchange": "BINANCE", "symbol": "", "base": "DOGE" },
            { "exchange": "kraken", "symbol": null, "base": "XBT" }
        ]);
        let listing = normalize_listing(&body);
        assert_eq!(listing.kraken, vec!["XBT"]);
        assert_eq!(listing.binance, vec!["DOGE"]);
    }

    #[test]
    fn test_partitioned_object_accepts_mixed_entries() {
        let body = json!({
            "kraken": ["XRPUSD", { "symbol": "ETHUSD" }, { "base": "ADA" }, { "price": 1 }],
            "binance": "not a list"
        });
        let listing = normalize_listing(&body);
        assert_eq!(listing.kraken, vec!["XRPUSD", "ETHUSD", "ADA"]);
        assert!(listing.binance.is_empty());
    }

    #[test]
    fn test_unrecognised_bodies_are_empty() {
        assert!(normalize_listing(&json!(null)).is_empty());
        assert!(normalize_listing(&json!(42)).is_empty());
        assert!(normalize_listing(&json!({})).is_empty());
        assert_eq!(FeedShape::detect(&json!("x")), FeedShape::Empty);
    }

    #[test]
    fn test_filter_is_case_insensitive_substring() {
        let listing = ExchangeListing {
            kraken: vec!["XRPUSD".into(), "ETHUSD".into()],
            binance: vec!["xrpusdt".into(), "SOLUSDT".into()],
        };
        let filtered = listing.filtered(" xrp ");
        assert_eq!(filtered.kraken, vec!["XRPUSD"]);
        assert_eq!(filtered.binance, vec!["xrpusdt"]);
        assert_eq!(listing.filtered(""), listing);
    }

    #[test]
    fn test_exchange_labels() {
        assert_eq!(Exchange::from_label(" KRAKEN "), Exchange::Kraken);
        assert_eq!(Exchange::from_label("Binance"), Exchange::Binance);
        assert_eq!(Exchange::from_label(""), Exchange::Unknown);
    }
}
