use chenda::config::FeedEndpoints;
use chenda::dashboard::{poller, routes, Dashboard, Tab, FETCH_FAILED};
use chenda::feed::FeedClient;
use chenda::icon::IconResolver;
use chenda::store::{CollectionPath, CollectionQuery, DocumentStore, JsonStore};
use futures::StreamExt;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use warp::http::StatusCode;
use warp::Filter;

fn serve_feeds() -> SocketAddr {
    let future = warp::path("future").map(|| {
        warp::reply::json(&json!({
            "kraken": [{ "symbol": "XRPUSD" }, { "base": "ETH" }],
            "binance": ["SOLUSDT", "xrpusdt"]
        }))
    });
    let top = warp::path("top").map(|| {
        warp::reply::json(&json!([
            { "exchange": "kraken", "symbol": "ADAUSD" },
            { "exchange": "binance", "symbol": "DOGEUSDT" },
            { "exchange": "coinbase", "symbol": "BTCUSD" }
        ]))
    });
    let new = warp::path("new").map(|| {
        warp::reply::with_status("down", StatusCode::INTERNAL_SERVER_ERROR)
    });
    let recs = warp::path("recs").map(|| {
        warp::reply::json(&json!({ "items": [{ "coin": "SOL", "action": "buy", "confidence": 90 }] }))
    });
    let signal = warp::path("signal").map(|| {
        warp::reply::json(&json!({ "whales": [{ "symbol": "XRPUSDT", "usd": 120000, "side": "SELL" }] }))
    });
    let books = warp::path("books")
        .and(warp::query::raw())
        .map(|q: String| warp::reply::json(&json!({ "query": q })));
    let hang = warp::path("hang").and_then(|| async {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok::<_, warp::Rejection>("late")
    });
    let ticker = warp::path!("api" / "v3" / "ticker" / "price").map(|| {
        warp::reply::json(&json!({ "symbol": "XRPUSDT", "price": "0.61230000" }))
    });

    let routes = future
        .or(top)
        .or(new)
        .or(recs)
        .or(signal)
        .or(books)
        .or(hang)
        .or(ticker);
    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

fn dashboard(addr: SocketAddr, signals: watch::Receiver<Vec<chenda::feed::SignalRecord>>) -> Dashboard {
    let base = format!("http://{addr}");
    let http = reqwest::Client::new();
    let endpoints = FeedEndpoints {
        new: format!("{base}/new"),
        top: format!("{base}/top"),
        future: format!("{base}/future"),
        recs: format!("{base}/recs"),
    };
    let icons = IconResolver::new(
        http.clone(),
        vec![format!("{base}/icons/{{base}}.png")],
        Duration::from_millis(500),
    );
    Dashboard::new(FeedClient::new(http, &base, &base), endpoints, icons, None, signals)
}

fn body<B: AsRef<[u8]>>(resp: &warp::http::Response<B>) -> Value {
    serde_json::from_slice(resp.body().as_ref()).unwrap()
}

#[tokio::test]
async fn tab_switch_refetches_and_filter_stays_local() {
    let addr = serve_feeds();
    let (_tx, rx) = watch::channel(Vec::new());
    let routes = routes::routes(dashboard(addr, rx));

    let resp = warp::test::request().method("POST").path("/api/tab/future").reply(&routes).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let view = body(&resp);
    assert_eq!(view["tab"], "future");
    assert_eq!(view["kraken"]["count"], 2);
    assert_eq!(view["binance"]["count"], 2);
    assert!(view["kraken"]["html"].as_str().unwrap().contains("<strong>ETH</strong>"));
    assert!(view["last_updated"].is_string());

    let resp = warp::test::request()
        .method("POST")
        .path("/api/filter")
        .json(&json!({ "q": " xrp " }))
        .reply(&routes)
        .await;
    let view = body(&resp);
    assert_eq!(view["filter"], "xrp");
    assert_eq!(view["kraken"]["count"], 1);
    assert_eq!(view["binance"]["count"], 1);

    let view = body(&warp::test::request().method("POST").path("/api/tab/top").reply(&routes).await);
    assert_eq!(view["tab"], "top");
    assert_eq!(view["kraken"]["count"], 0);
    assert!(view["kraken"]["html"].as_str().unwrap().contains("No items."));

    let view = body(&warp::test::request().path("/api/view").reply(&routes).await);
    assert_eq!(view["tab"], "top");
    assert_eq!(view["filter"], "xrp");
}

#[tokio::test]
async fn failed_fetch_sets_notice_and_keeps_data() {
    let addr = serve_feeds();
    let (_tx, rx) = watch::channel(Vec::new());
    let routes = routes::routes(dashboard(addr, rx));

    let view = body(&warp::test::request().method("POST").path("/api/tab/new").reply(&routes).await);
    assert_eq!(view["tab"], "new");
    assert_eq!(view["notice"], FETCH_FAILED);
    assert_eq!(view["kraken"]["count"], 0);

    let view = body(&warp::test::request().method("POST").path("/api/tab/recs").reply(&routes).await);
    assert!(view["notice"].is_null());
    assert_eq!(view["recs"]["count"], 1);
    assert!(view["recs"]["html"].as_str().unwrap().contains(r#"<div class="sig-buy">BUY</div>"#));

    let resp = warp::test::request().method("POST").path("/api/tab/gainers").reply(&routes).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn silent_feed_times_out_into_notice() {
    let addr = serve_feeds();
    let base = format!("http://{addr}");
    let http = reqwest::Client::new();
    let endpoints = FeedEndpoints {
        new: format!("{base}/new"),
        top: format!("{base}/top"),
        future: format!("{base}/hang"),
        recs: format!("{base}/recs"),
    };
    let icons = IconResolver::new(http.clone(), Vec::new(), Duration::from_millis(100));
    let feeds = FeedClient::new(http, &base, &base).with_timeout(Duration::from_millis(300));
    let (_tx, rx) = watch::channel(Vec::new());
    let dash = Dashboard::new(feeds, endpoints, icons, None, rx);

    let outcome = tokio::time::timeout(Duration::from_secs(5), dash.refresh_tab(Tab::Future))
        .await
        .expect("refresh should not hang");
    assert!(outcome.is_err());
    assert_eq!(dash.view().notice.as_deref(), Some(FETCH_FAILED));

    let routes = routes::routes(dash);
    let view = tokio::time::timeout(
        Duration::from_secs(5),
        warp::test::request().method("POST").path("/api/refresh").reply(&routes),
    )
    .await
    .expect("refresh route should answer");
    assert_eq!(view.status(), StatusCode::OK);
    assert_eq!(body(&view)["notice"], FETCH_FAILED);
}

#[tokio::test]
async fn chat_price_and_raw_views() {
    let addr = serve_feeds();
    let (_tx, rx) = watch::channel(Vec::new());
    let routes = routes::routes(dashboard(addr, rx));

    let reply = body(
        &warp::test::request()
            .method("POST")
            .path("/api/chat")
            .json(&json!({ "text": "show sol" }))
            .reply(&routes)
            .await,
    );
    assert_eq!(reply["reply"], "Chenda: Filtering for SOL.");
    assert_eq!(reply["view"]["filter"], "SOL");

    let reply = body(
        &warp::test::request()
            .method("POST")
            .path("/api/chat")
            .json(&json!({ "text": "   " }))
            .reply(&routes)
            .await,
    );
    assert_eq!(reply["reply"], "");

    let price = body(&warp::test::request().path("/api/price/xrp").reply(&routes).await);
    assert_eq!(price, json!({ "base": "XRP", "usd": 0.6123 }));

    let raw = body(&warp::test::request().path("/api/raw/books?symbol=sol").reply(&routes).await);
    assert_eq!(raw["ok"], true);
    assert!(raw["html"].as_str().unwrap().contains("symbol=SOL"));

    let resp = warp::test::request().path("/api/raw/universe").reply(&routes).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let resp = warp::test::request().path("/api/raw/secrets").reply(&routes).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let page = warp::test::request().path("/").reply(&routes).await;
    assert_eq!(page.status(), StatusCode::OK);
    assert!(std::str::from_utf8(page.body()).unwrap().contains("/api/signals/ws"));
}

#[tokio::test]
async fn websocket_pushes_cards_after_store_append() {
    let feeds = serve_feeds();
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonStore::new(dir.path()));
    let (tx, rx) = watch::channel(Vec::new());
    let subscription = tokio::spawn(poller::run_signal_subscription(
        store.clone(),
        CollectionQuery::parse("whaleSignals").unwrap(),
        tx,
    ));

    let dash = dashboard(feeds, rx);
    let (addr, server) =
        warp::serve(routes::routes(dash.clone())).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/api/signals/ws"))
        .await
        .unwrap();
    let first = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let first: Value = serde_json::from_str(first.to_text().unwrap()).unwrap();
    assert_eq!(first["count"], 0);

    store
        .add(
            &CollectionPath::parse("whaleSignals").unwrap(),
            json!({ "coin": "XRPUSDT", "action": "sell", "confidence": 88 }),
        )
        .await
        .unwrap();

    let pushed = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(Ok(msg)) = socket.next().await {
            let panel: Value = serde_json::from_str(msg.to_text().unwrap()).unwrap();
            if panel["count"] == 1 {
                return panel;
            }
        }
        panic!("socket closed before the new signal arrived");
    })
    .await
    .unwrap();
    assert!(pushed["html"].as_str().unwrap().contains(r#"<div class="sig-sell">SELL</div>"#));

    let snapshot = body(&warp::test::request().path("/api/signals").reply(&routes::routes(dash)).await);
    assert_eq!(snapshot["count"], 1);

    subscription.abort();
}
