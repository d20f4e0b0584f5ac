// ============================================================================
// Dashboard HTTP server & API
// ============================================================================

use super::page::DASHBOARD_HTML;
use super::{Dashboard, RawKind, Tab};
use crate::render::render_key_values;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, warn};
use warp::http::StatusCode;
use warp::ws::{Message, WebSocket, Ws};
use warp::{Filter, Rejection, Reply};

#[derive(Debug, Deserialize)]
struct FilterBody {
    #[serde(default)]
    q: String,
}

#[derive(Debug, Deserialize)]
struct ChatBody {
    #[serde(default)]
    text: String,
}

fn error_reply(status: StatusCode, message: impl Into<String>) -> warp::reply::Response {
    warp::reply::with_status(
        warp::reply::json(&json!({ "ok": false, "error": message.into() })),
        status,
    )
    .into_response()
}

pub fn routes(
    dashboard: Dashboard,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let dashboard_filter = warp::any().map(move || dashboard.clone());

    let index = warp::path::end()
        .and(warp::get())
        .map(|| warp::reply::html(DASHBOARD_HTML));

    let api_view = warp::path!("api" / "view")
        .and(warp::get())
        .and(dashboard_filter.clone())
        .map(|dashboard: Dashboard| warp::reply::json(&dashboard.view()));

    let api_tab = warp::path!("api" / "tab" / String)
        .and(warp::post())
        .and(dashboard_filter.clone())
        .and_then(|tab: String, dashboard: Dashboard| async move {
            let reply = match tab.parse::<Tab>() {
                Ok(tab) => warp::reply::json(&dashboard.select_tab(tab).await).into_response(),
                Err(e) => error_reply(StatusCode::BAD_REQUEST, e.to_string()),
            };
            Ok::<_, Rejection>(reply)
        });

    let api_filter = warp::path!("api" / "filter")
        .and(warp::post())
        .and(warp::body::json())
        .and(dashboard_filter.clone())
        .map(|body: FilterBody, dashboard: Dashboard| {
            warp::reply::json(&dashboard.set_filter(&body.q))
        });

    let api_refresh = warp::path!("api" / "refresh")
        .and(warp::post())
        .and(dashboard_filter.clone())
        .and_then(|dashboard: Dashboard| async move {
            Ok::<_, Rejection>(warp::reply::json(&dashboard.refresh().await))
        });

    let api_chat = warp::path!("api" / "chat")
        .and(warp::post())
        .and(warp::body::json())
        .and(dashboard_filter.clone())
        .and_then(|body: ChatBody, dashboard: Dashboard| async move {
            let (reply, view) = dashboard.chat(&body.text).await;
            Ok::<_, Rejection>(warp::reply::json(&json!({ "reply": reply, "view": view })))
        });

    let api_signals = warp::path!("api" / "signals")
        .and(warp::get())
        .and(dashboard_filter.clone())
        .map(|dashboard: Dashboard| warp::reply::json(&dashboard.signals_panel()));

    let api_signals_ws = warp::path!("api" / "signals" / "ws")
        .and(warp::ws())
        .and(dashboard_filter.clone())
        .map(|ws: Ws, dashboard: Dashboard| {
            ws.on_upgrade(move |socket| push_signals(socket, dashboard))
        });

    let api_price = warp::path!("api" / "price" / String)
        .and(warp::get())
        .and(dashboard_filter.clone())
        .and_then(|base: String, dashboard: Dashboard| async move {
            let base = base.trim().to_uppercase();
            let usd = dashboard.usd_price(&base).await;
            Ok::<_, Rejection>(warp::reply::json(&json!({ "base": base, "usd": usd })))
        });

    let api_raw = warp::path!("api" / "raw" / String)
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(dashboard_filter)
        .and_then(
            |kind: String, query: HashMap<String, String>, dashboard: Dashboard| async move {
                let Some(raw_kind) = RawKind::parse(&kind) else {
                    return Ok::<_, Rejection>(error_reply(
                        StatusCode::NOT_FOUND,
                        format!("unknown upstream view {kind:?}"),
                    ));
                };
                let symbol = query.get("symbol").map(String::as_str);
                let reply = match dashboard.raw(raw_kind, symbol).await {
                    Ok(value) => warp::reply::json(&json!({
                        "ok": true,
                        "html": render_key_values(&value),
                    }))
                    .into_response(),
                    Err(e) => {
                        warn!(%kind, error = %e, "upstream view failed");
                        error_reply(StatusCode::BAD_GATEWAY, e.to_string())
                    }
                };
                Ok(reply)
            },
        );

    index
        .or(api_view)
        .or(api_tab)
        .or(api_filter)
        .or(api_refresh)
        .or(api_chat)
        .or(api_signals)
        .or(api_signals_ws)
        .or(api_price)
        .or(api_raw)
}

/// Send the rendered cards now and after every live update until the client
/// goes away.
async fn push_signals(socket: WebSocket, dashboard: Dashboard) {
    let (mut sender, mut receiver) = socket.split();
    let mut signals = dashboard.signals();
    signals.mark_unchanged();

    if send_panel(&mut sender, &dashboard).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            changed = signals.changed() => {
                if changed.is_err() {
                    debug!("signal feed ended, closing socket");
                    break;
                }
                if send_panel(&mut sender, &dashboard).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(msg)) if msg.is_close() => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "signal socket error");
                    break;
                }
                None => break,
            },
        }
    }
    let _ = sender.close().await;
}

async fn send_panel<S>(sender: &mut S, dashboard: &Dashboard) -> Result<(), warp::Error>
where
    S: futures::Sink<Message, Error = warp::Error> + Unpin,
{
    let panel = dashboard.signals_panel();
    match serde_json::to_string(&panel) {
        Ok(text) => sender.send(Message::text(text)).await,
        Err(e) => {
            warn!(error = %e, "could not encode signal panel");
            Ok(())
        }
    }
}
