// ============================================================================
// HTML fragments for the dashboard containers
// ============================================================================
//
// Every function returns the full inner HTML of its container; the page swaps
// it in wholesale, so there is never a stale or duplicated node to clean up.

use crate::dashboard::state::{DashboardState, Tab};
use crate::feed::{Exchange, SignalRecord, WhaleRecord};
use crate::icon::IconResolver;
use crate::symbol::{base_asset, friendly_name};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write;

pub const NO_ITEMS: &str = "No items.";
pub const NO_RECS: &str = "No live recommendations yet.";
pub const NO_SIGNALS: &str = "No signals yet.";
pub const NO_WHALES: &str = "No whale trades yet.";
const NO_DATA: &str = "No data";

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn placeholder(message: &str) -> String {
    format!(r#"<div class="meta">{}</div>"#, escape_html(message))
}

fn icon_img(base: &str, icons: &IconResolver) -> String {
    format!(
        r#"<img class="icon" alt="{alt}" src="{src}"/>"#,
        alt = escape_html(base),
        src = escape_html(&icons.src_for(base)),
    )
}

fn fmt_num(value: Option<f64>) -> String {
    match value {
        Some(v) if v.abs() >= 1000.0 => format!("{v:.0}"),
        Some(v) if v.abs() >= 1.0 => format!("{v:.2}"),
        Some(v) => format!("{v:.6}"),
        None => String::new(),
    }
}

// ============================================================================
// Chips (listing tabs)
// ============================================================================

pub fn render_chips(symbols: &[String], tag: &str, icons: &IconResolver) -> String {
    if symbols.is_empty() {
        return placeholder(NO_ITEMS);
    }

    let mut html = String::new();
    for symbol in symbols {
        let base = base_asset(symbol);
        let _ = write!(
            html,
            concat!(
                r#"<div class="chip" title="{symbol}">{icon}"#,
                r#"<span class="tag">{tag}</span><strong>{base}</strong>"#,
                r#"<small>{name}</small><span class="price" data-base="{base}"></span></div>"#
            ),
            symbol = escape_html(symbol),
            icon = icon_img(&base, icons),
            tag = escape_html(tag),
            base = escape_html(&base),
            name = escape_html(&friendly_name(&base)),
        );
    }
    html
}

// ============================================================================
// Signal cards (recs tab & live signals)
// ============================================================================

pub fn render_signal_cards(records: &[SignalRecord], icons: &IconResolver, empty: &str) -> String {
    if records.is_empty() {
        return placeholder(empty);
    }

    let mut html = String::new();
    for record in records {
        let coin = if record.coin.is_empty() { "?" } else { record.coin.as_str() };
        let base = base_asset(coin);
        let confidence = record
            .confidence
            .map(|c| format!("{:.0}%", c.round()))
            .unwrap_or_default();
        let reason = if record.reason.is_empty() { "—" } else { record.reason.as_str() };

        let details: Vec<String> = [("Price", record.price), ("Volume", record.volume)]
            .into_iter()
            .filter(|(_, v)| v.is_some())
            .map(|(label, v)| format!("{label}: {}", fmt_num(v)))
            .collect();

        let _ = write!(
            html,
            concat!(
                r#"<div class="rec"><div class="head">{icon}<strong>{coin}</strong>"#,
                r#"<span class="conf">{confidence}</span></div>"#,
                r#"<div class="{class}">{action}</div>"#,
                r#"<div class="reason">{reason}</div>"#,
                r#"<div class="details">{details}</div>"#,
                r#"<small class="time">{time}</small></div>"#
            ),
            icon = icon_img(&base, icons),
            coin = escape_html(coin),
            confidence = confidence,
            class = record.action.css_class(),
            action = record.action.as_str(),
            reason = escape_html(reason),
            details = escape_html(&details.join(" • ")),
            time = escape_html(&record.time.display()),
        );
    }
    html
}

// ============================================================================
// Tables
// ============================================================================

pub fn render_whales(whales: &[WhaleRecord]) -> String {
    if whales.is_empty() {
        return placeholder(NO_WHALES);
    }

    let mut html = String::from(
        "<table><thead><tr><th>Symbol</th><th>Side</th><th>Price</th>\
         <th>Qty</th><th>USD</th><th>Venue</th></tr></thead><tbody>",
    );
    for whale in whales {
        let _ = write!(
            html,
            r#"<tr class="whale"><td>{}</td><td class="{}">{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>"#,
            escape_html(&whale.symbol),
            whale.side.css_class(),
            whale.side.as_str(),
            fmt_num(whale.price),
            fmt_num(whale.qty),
            fmt_num(whale.usd),
            escape_html(whale.price_venue.as_deref().unwrap_or_default()),
        );
    }
    html.push_str("</tbody></table>");
    html
}

/// Key/Value table of an opaque JSON object; nested values are shown as JSON.
pub fn render_key_values(value: &Value) -> String {
    let Some(map) = value.as_object() else {
        return placeholder(NO_DATA);
    };

    let mut html = String::from("<table><thead><tr><th>Key</th><th>Value</th></tr></thead><tbody>");
    for (key, value) in map {
        let shown = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td></tr>",
            escape_html(key),
            escape_html(&shown)
        );
    }
    html.push_str("</tbody></table>");
    html
}

// ============================================================================
// Full view
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Panel {
    pub count: usize,
    pub html: String,
}

/// Everything the page needs to redraw itself for the current tab.
#[derive(Debug, Clone, Serialize)]
pub struct View {
    pub tab: Tab,
    pub filter: String,
    pub last_updated: Option<String>,
    pub notice: Option<String>,
    pub kraken: Panel,
    pub binance: Panel,
    pub recs: Panel,
    pub whales: Panel,
}

pub fn render_view(state: &DashboardState, icons: &IconResolver) -> View {
    let tab = state.tab();

    let (kraken, binance, recs) = match tab.tag() {
        Some(tag) => {
            let listing = state.visible_listing();
            let panel = |exchange: Exchange| {
                let symbols = listing.get(exchange);
                Panel {
                    count: symbols.len(),
                    html: render_chips(symbols, tag, icons),
                }
            };
            (panel(Exchange::Kraken), panel(Exchange::Binance), empty_panel())
        }
        None => {
            let recs = state.recs();
            let panel = Panel {
                count: recs.len(),
                html: render_signal_cards(recs, icons, NO_RECS),
            };
            (empty_panel(), empty_panel(), panel)
        }
    };

    View {
        tab,
        filter: state.filter().to_string(),
        last_updated: state
            .last_updated()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
        notice: state.notice().map(str::to_string),
        kraken,
        binance,
        recs,
        whales: Panel {
            count: state.whales().len(),
            html: render_whales(state.whales()),
        },
    }
}

fn empty_panel() -> Panel {
    Panel {
        count: 0,
        html: String::new(),
    }
}
