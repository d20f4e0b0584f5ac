// ============================================================================
// Proxy service: upstream relay & alert sink
// ============================================================================
//
// GET /ping | /signal | /books | /last | /universe
//   forwarded verbatim (query string included) to the configured upstream and
//   wrapped as { ok, from, data }, or 502 { ok: false, error, target }.
// POST /alert
//   any JSON, stamped with `ts` (epoch ms) and appended to `alerts`.

use crate::error::{FeedError, StoreError};
use crate::store::{CollectionPath, DocumentStore};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

pub const FORWARD_ROUTES: [&str; 4] = ["signal", "books", "last", "universe"];
pub const ALERTS_COLLECTION: &str = "alerts";

#[derive(Clone)]
pub struct ProxyContext {
    client: reqwest::Client,
    upstream: Arc<str>,
    timeout: Duration,
    store: Arc<dyn DocumentStore>,
    alerts: CollectionPath,
}

impl ProxyContext {
    pub fn new(
        client: reqwest::Client,
        upstream: &str,
        timeout: Duration,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            client,
            upstream: Arc::from(upstream.trim().trim_end_matches('/')),
            timeout,
            store,
            alerts: CollectionPath::parse(ALERTS_COLLECTION)?,
        })
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// `{upstream}{route}`, with `?{raw_query}` appended untouched when present.
    pub fn target(&self, route: &str, raw_query: &str) -> String {
        if raw_query.is_empty() {
            format!("{}{}", self.upstream, route)
        } else {
            format!("{}{}?{}", self.upstream, route, raw_query)
        }
    }

    /// One GET to the upstream. Failures come back as a 502 body, never as an error.
    pub async fn forward(&self, route: &str, raw_query: &str) -> (StatusCode, Value) {
        let target = self.target(route, raw_query);
        match self.fetch(&target).await {
            Ok(data) => {
                debug!(%target, "forwarded");
                (StatusCode::OK, json!({ "ok": true, "from": target, "data": data }))
            }
            Err(e) => {
                warn!(%target, error = %e, "upstream request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    json!({ "ok": false, "error": e.to_string(), "target": target }),
                )
            }
        }
    }

    async fn fetch(&self, target: &str) -> Result<Value, FeedError> {
        let response = self.client.get(target).timeout(self.timeout).send().await?;
        if !response.status().is_success() {
            return Err(FeedError::Status {
                status: response.status().as_u16(),
                url: target.to_string(),
            });
        }
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn alert(&self, body: Value) -> (StatusCode, Value) {
        let ts = Utc::now().timestamp_millis();
        let document = match body {
            Value::Object(mut map) => {
                map.insert("ts".to_string(), json!(ts));
                Value::Object(map)
            }
            other => json!({ "payload": other, "ts": ts }),
        };

        match self.store.add(&self.alerts, document).await {
            Ok(id) => (StatusCode::OK, json!({ "ok": true, "id": id })),
            Err(e) => {
                error!(error = %e, "alert not persisted");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "ok": false, "error": e.to_string() }),
                )
            }
        }
    }
}

/// The raw query string, or an empty one when the request has none.
fn raw_query() -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    warp::query::raw().or_else(|_| async { Ok::<(String,), Rejection>((String::new(),)) })
}

fn json_reply(status: StatusCode, body: Value) -> impl Reply {
    warp::reply::with_status(warp::reply::json(&body), status)
}

pub fn routes(ctx: ProxyContext) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let ctx_filter = warp::any().map(move || ctx.clone());

    let ping = warp::path!("ping")
        .and(warp::get())
        .and(ctx_filter.clone())
        .map(|ctx: ProxyContext| warp::reply::json(&json!({ "ok": true, "upstream": ctx.upstream() })));

    let forward = warp::get()
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and_then(|route: String| async move {
            if FORWARD_ROUTES.contains(&route.as_str()) {
                Ok(route)
            } else {
                Err(warp::reject::not_found())
            }
        })
        .and(raw_query())
        .and(ctx_filter.clone())
        .and_then(|route: String, query: String, ctx: ProxyContext| async move {
            let (status, body) = ctx.forward(&format!("/{route}"), &query).await;
            Ok::<_, Rejection>(json_reply(status, body))
        });

    let alert = warp::path!("alert")
        .and(warp::post())
        .and(warp::body::json())
        .and(ctx_filter)
        .and_then(|body: Value, ctx: ProxyContext| async move {
            let (status, body) = ctx.alert(body).await;
            Ok::<_, Rejection>(json_reply(status, body))
        });

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec!["content-type", "authorization"]);

    ping.or(forward)
        .or(alert)
        .with(cors)
        .with(warp::reply::with::header("access-control-allow-origin", "*"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonStore;

    fn context(upstream: &str) -> (tempfile::TempDir, ProxyContext) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::new(dir.path()));
        let ctx = ProxyContext::new(reqwest::Client::new(), upstream, Duration::from_secs(1), store)
            .unwrap();
        (dir, ctx)
    }

    #[test]
    fn test_target_keeps_query_verbatim() {
        let (_dir, ctx) = context("https://up.example/");
        assert_eq!(ctx.upstream(), "https://up.example");
        assert_eq!(ctx.target("/books", "symbol=XRP"), "https://up.example/books?symbol=XRP");
        assert_eq!(ctx.target("/last", ""), "https://up.example/last");
        assert_eq!(
            ctx.target("/signal", "min_usd=5e4&x=%20y"),
            "https://up.example/signal?min_usd=5e4&x=%20y"
        );
    }

    #[tokio::test]
    async fn test_alert_wraps_non_object_bodies() {
        let (dir, ctx) = context("http://127.0.0.1:1");
        let (status, body) = ctx.alert(json!([1, 2])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);

        let content = std::fs::read_to_string(dir.path().join("alerts.jsonl")).unwrap();
        let stored: Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(stored["data"]["payload"], json!([1, 2]));
        assert!(stored["data"]["ts"].as_i64().unwrap() > 1_600_000_000_000);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_forwarded() {
        let (_dir, ctx) = context("http://127.0.0.1:1");
        let resp = warp::test::request().path("/health").reply(&routes(ctx)).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
