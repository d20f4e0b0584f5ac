use super::shape::{normalize_listing, ExchangeListing};
use super::signal::{normalize_recs, SignalRecord, SignalSnapshot};
use crate::error::FeedError;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_FEED_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP side of the dashboard: every feed fetch goes through here.
#[derive(Clone)]
pub struct FeedClient {
    http: Client,
    api_base: String,
    price_api_base: String,
    timeout: Duration,
}

impl FeedClient {
    pub fn new(
        http: Client,
        api_base: impl Into<String>,
        price_api_base: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            price_api_base: price_api_base.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_FEED_TIMEOUT,
        }
    }

    /// Upper bound for one request, headers and body included. A feed that
    /// never answers fails like any other instead of stalling the poll loop.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub async fn fetch_json(&self, url: &str) -> Result<Value, FeedError> {
        debug!(%url, "fetching feed");

        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .header(CACHE_CONTROL, "no-store")
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FeedError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn fetch_listing(&self, url: &str) -> Result<ExchangeListing, FeedError> {
        let body = self.fetch_json(url).await?;
        Ok(normalize_listing(&body))
    }

    pub async fn fetch_recs(&self, url: &str) -> Result<Vec<SignalRecord>, FeedError> {
        let body = self.fetch_json(url).await?;
        Ok(normalize_recs(&body))
    }

    // ------------------------------------------------------------------------
    // Signal service (api_base)
    // ------------------------------------------------------------------------

    pub async fn fetch_signal(&self, min_usd: Option<f64>) -> Result<SignalSnapshot, FeedError> {
        let query = min_usd
            .map(|usd| format!("?min_usd={}", urlencoding::encode(&usd.to_string())))
            .unwrap_or_default();
        let body = self.fetch_json(&self.api_url(&format!("/signal{query}"))).await?;
        Ok(SignalSnapshot::from_value(&body))
    }

    pub async fn fetch_books(&self, symbol: &str) -> Result<Value, FeedError> {
        let symbol = match symbol.trim() {
            "" => "XRP".to_string(),
            s => s.to_uppercase(),
        };
        let path = format!("/books?symbol={}", urlencoding::encode(&symbol));
        self.fetch_json(&self.api_url(&path)).await
    }

    pub async fn fetch_universe(&self) -> Result<Value, FeedError> {
        self.fetch_json(&self.api_url("/universe")).await
    }

    pub async fn fetch_last(&self) -> Result<Value, FeedError> {
        self.fetch_json(&self.api_url("/last")).await
    }

    pub async fn fetch_health(&self) -> Result<Value, FeedError> {
        self.fetch_json(&self.api_url("/health")).await
    }

    /// Spot USD price via the `{BASE}USDT` ticker. Any failure is `None`.
    pub async fn fetch_usd_price(&self, base: &str) -> Option<f64> {
        let pair = format!("{}USDT", base.trim().to_uppercase());
        let url = format!(
            "{}/api/v3/ticker/price?symbol={}",
            self.price_api_base,
            urlencoding::encode(&pair)
        );
        let body = match self.fetch_json(&url).await {
            Ok(body) => body,
            Err(e) => {
                debug!(%pair, error = %e, "price lookup failed");
                return None;
            }
        };
        let price = match &body["price"] {
            Value::String(s) => s.parse::<f64>().ok(),
            Value::Number(n) => n.as_f64(),
            _ => None,
        };
        price.filter(|p| p.is_finite())
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use warp::Filter;

    fn serve_feeds() -> SocketAddr {
        let listing = warp::path("listing").map(|| {
            warp::reply::json(&json!({ "kraken": [{ "symbol": "XRPUSD" }], "binance": ["SOLUSDT"] }))
        });
        let recs = warp::path("recs").map(|| {
            warp::reply::json(&json!({ "items": [{ "symbol": "ADA", "action": "buy", "confidence": 71 }] }))
        });
        let broken = warp::path("broken").map(|| {
            warp::reply::with_status("down", warp::http::StatusCode::INTERNAL_SERVER_ERROR)
        });
        let garbage = warp::path("garbage").map(|| "{not json");
        let hang = warp::path("hang").and_then(|| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok::<_, warp::Rejection>("late")
        });
        let books = warp::path("books")
            .and(warp::query::<HashMap<String, String>>())
            .map(|q: HashMap<String, String>| warp::reply::json(&json!({ "symbol": q.get("symbol") })));
        let ticker = warp::path!("api" / "v3" / "ticker" / "price")
            .and(warp::query::<HashMap<String, String>>())
            .map(|q: HashMap<String, String>| {
                warp::reply::json(&json!({ "symbol": q.get("symbol"), "price": "0.61230000" }))
            });
        let signal = warp::path("signal").map(|| {
            warp::reply::json(&json!({ "whales": [{ "symbol": "XRPUSDT", "usd": 120000, "side": "SELL" }] }))
        });

        let routes = listing
            .or(recs)
            .or(broken)
            .or(garbage)
            .or(hang)
            .or(books)
            .or(ticker)
            .or(signal);
        let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        addr
    }

    fn client(addr: SocketAddr) -> FeedClient {
        let base = format!("http://{addr}/");
        FeedClient::new(Client::new(), base.clone(), base)
    }

    #[tokio::test]
    async fn test_fetch_listing_and_recs() {
        let addr = serve_feeds();
        let client = client(addr);

        let listing = client.fetch_listing(&format!("http://{addr}/listing")).await.unwrap();
        assert_eq!(listing.kraken, vec!["XRPUSD"]);
        assert_eq!(listing.binance, vec!["SOLUSDT"]);

        let recs = client.fetch_recs(&format!("http://{addr}/recs")).await.unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].confidence, Some(71.0));
    }

    #[tokio::test]
    async fn test_fetch_errors_are_typed() {
        let addr = serve_feeds();
        let client = client(addr);

        let err = client.fetch_json(&format!("http://{addr}/broken")).await.unwrap_err();
        assert!(matches!(err, FeedError::Status { status: 500, .. }));

        let err = client.fetch_json(&format!("http://{addr}/garbage")).await.unwrap_err();
        assert!(matches!(err, FeedError::Json(_)));

        let err = client.fetch_json("http://127.0.0.1:1/feed").await.unwrap_err();
        assert!(matches!(err, FeedError::Http(_)));
    }

    #[tokio::test]
    async fn test_silent_upstream_times_out() {
        let addr = serve_feeds();
        let client = client(addr).with_timeout(Duration::from_millis(200));

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            client.fetch_json(&format!("http://{addr}/hang")),
        )
        .await
        .expect("request should give up on its own")
        .unwrap_err();
        match err {
            FeedError::Http(e) => assert!(e.is_timeout()),
            other => panic!("expected a timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_signal_service_endpoints() {
        let addr = serve_feeds();
        let client = client(addr);
        assert_eq!(client.api_base(), format!("http://{addr}"));

        let books = client.fetch_books("xrp").await.unwrap();
        assert_eq!(books["symbol"], "XRP");
        let books = client.fetch_books("").await.unwrap();
        assert_eq!(books["symbol"], "XRP");

        let snapshot = client.fetch_signal(Some(50_000.0)).await.unwrap();
        assert_eq!(snapshot.whales[0].usd, Some(120_000.0));

        assert_eq!(client.fetch_usd_price("xrp").await, Some(0.6123));
        assert!(client.fetch_universe().await.is_err());
    }
}
