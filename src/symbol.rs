// ============================================================================
// Pair and base-asset normalisation
// ============================================================================
//
// Exchanges hand out pairs as `XRPUSDT`, `xrp/usdt`, `XRP-USDT` and worse.
// Everything the dashboard displays or looks an icon up for goes through
// `base_asset` first.

use lazy_static::lazy_static;
use std::collections::HashMap;

/// Quote currencies stripped from the end of a pair. First match in list
/// order wins, so `ETHBTC` resolves to `ETH` and `BTCUSDT` never reaches `USD`.
pub const COMMON_QUOTES: [&str; 26] = [
    "USDT", "USDC", "TUSD", "BUSD", "USD", "EUR", "GBP", "AUD", "TRY", "BRL", "JPY", "CAD", "CHF",
    "ZAR", "NGN", "RUB", "IDR", "ARS", "AED", "KRW", "MXN", "PLN", "SGD", "BTC", "ETH", "BNB",
];

const FALLBACK_LEN: usize = 5;

lazy_static! {
    static ref ALIAS: HashMap<&'static str, &'static str> = {
        let mut map = HashMap::new();
        map.insert("LINK", "Chainlink");
        map.insert("BTC", "Bitcoin");
        map.insert("ETH", "Ethereum");
        map.insert("SOL", "Solana");
        map.insert("ADA", "Cardano");
        map.insert("BNB", "BNB");
        map.insert("XRP", "XRP");
        map.insert("DOGE", "Dogecoin");
        map.insert("AVAX", "Avalanche");
        map.insert("MATIC", "Polygon");
        map.insert("DOT", "Polkadot");
        map.insert("PEPE", "PEPE");
        map.insert("SHIB", "Shiba Inu");
        map.insert("NEO", "NEO");
        map.insert("LTC", "Litecoin");
        map.insert("ALGO", "Algorand");
        map.insert("JASMY", "Jasmy");
        map.insert("BONK", "BONK");
        map
    };
}

/// Uppercase and keep only `A-Z`, `0-9` and `-`.
pub fn normalize_pair(raw: &str) -> String {
    raw.chars()
        .flat_map(char::to_uppercase)
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}

/// Base asset of a raw pair: `"XRPUSDT"` and `"xrp/usdt"` both give `"XRP"`.
///
/// When no known quote is a proper suffix the first five characters are
/// used, which keeps bare tickers such as `"SOL"` intact.
pub fn base_asset(raw: &str) -> String {
    let pair = normalize_pair(raw);

    for quote in COMMON_QUOTES {
        if pair.len() > quote.len() && pair.ends_with(quote) {
            let stripped = pair[..pair.len() - quote.len()].trim_end_matches('-');
            if !stripped.is_empty() {
                return stripped.to_string();
            }
        }
    }

    // normalize_pair only yields ASCII, byte slicing is safe
    pair[..pair.len().min(FALLBACK_LEN)].to_string()
}

/// Same as [`base_asset`] for values that may be absent.
pub fn base_asset_opt(raw: Option<&str>) -> String {
    base_asset(raw.unwrap_or_default())
}

/// Display name for a base asset, falling back to the ticker itself.
pub fn friendly_name(base: &str) -> String {
    let upper = base.to_uppercase();
    match ALIAS.get(upper.as_str()) {
        Some(name) => name.to_string(),
        None => upper,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_asset_known_quotes() {
        assert_eq!(base_asset("XRPUSDT"), "XRP");
        assert_eq!(base_asset("xrp/usdt"), "XRP");
        assert_eq!(base_asset("XRP-USDT"), "XRP");
        assert_eq!(base_asset("ETHBTC"), "ETH");
        assert_eq!(base_asset("btc_eur"), "BTC");
        assert_eq!(base_asset(""), "");
    }

    #[test]
    fn test_base_asset_falls_back_to_prefix() {
        assert_eq!(base_asset("SOL"), "SOL");
        assert_eq!(base_asset("PEPEWIFHAT"), "PEPEW");
        // A bare quote is not stripped from itself
        assert_eq!(base_asset("USDT"), "USDT");
        assert_eq!(base_asset_opt(None), "");
    }

    #[test]
    fn test_base_asset_idempotent_under_normalisation() {
        let inputs = [
            "XRPUSDT", "xrp/usdt", "  ada-usdc ", "ÉTHBTC", "doge", "1000SHIBUSDT", "a/b/c", "--",
        ];
        for input in inputs {
            assert_eq!(
                base_asset(input),
                base_asset(&normalize_pair(input)),
                "input {input:?}"
            );
        }
    }

    #[test]
    fn test_normalize_pair_strips_separators() {
        assert_eq!(normalize_pair("xrp/usdt"), "XRPUSDT");
        assert_eq!(normalize_pair("xbt-eur"), "XBT-EUR");
        assert_eq!(normalize_pair(" sol_usd "), "SOLUSD");
    }

    #[test]
    fn test_friendly_name() {
        assert_eq!(friendly_name("btc"), "Bitcoin");
        assert_eq!(friendly_name("SHIB"), "Shiba Inu");
        assert_eq!(friendly_name("wif"), "WIF");
    }
}
