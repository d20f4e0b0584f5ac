// ============================================================================
// The dashboard server: one shared `Dashboard` handle cloned into every
// route, the poll loop and the live signal subscription
// ============================================================================

pub mod page;
pub mod poller;
pub mod routes;
pub mod state;

pub use state::{interpret, ChatCommand, DashboardState, NoticeSource, Tab};

use crate::config::FeedEndpoints;
use crate::error::FeedError;
use crate::feed::{FeedClient, SignalRecord};
use crate::icon::IconResolver;
use crate::render::{self, Panel, View, NO_SIGNALS};
use crate::symbol::base_asset;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

pub const CHAT_REFRESH: &str = "Chenda: Fetching fresh data…";
pub const CHAT_HELP: &str = "Chenda: I’m here. Ask me about coins or say REFRESH to fetch latest.";
pub const FETCH_FAILED: &str = "Chenda: I couldn’t fetch data right now.";

/// Which opaque upstream endpoint `/api/raw/{kind}` shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKind {
    Universe,
    Last,
    Health,
    Books,
}

impl RawKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "universe" => Some(Self::Universe),
            "last" => Some(Self::Last),
            "health" => Some(Self::Health),
            "books" => Some(Self::Books),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct Dashboard {
    state: Arc<Mutex<DashboardState>>,
    feeds: FeedClient,
    endpoints: Arc<FeedEndpoints>,
    icons: IconResolver,
    whale_min_usd: Option<f64>,
    signals: watch::Receiver<Vec<SignalRecord>>,
}

impl Dashboard {
    pub fn new(
        feeds: FeedClient,
        endpoints: FeedEndpoints,
        icons: IconResolver,
        whale_min_usd: Option<f64>,
        signals: watch::Receiver<Vec<SignalRecord>>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(DashboardState::default())),
            feeds,
            endpoints: Arc::new(endpoints),
            icons,
            whale_min_usd,
            signals,
        }
    }

    pub fn view(&self) -> View {
        let state = self.state.lock();
        render::render_view(&state, &self.icons)
    }

    pub fn current_tab(&self) -> Tab {
        self.state.lock().tab()
    }

    fn endpoint(&self, tab: Tab) -> &str {
        match tab {
            Tab::New => &self.endpoints.new,
            Tab::Top => &self.endpoints.top,
            Tab::Future => &self.endpoints.future,
            Tab::Recs => &self.endpoints.recs,
        }
    }

    /// Fetch one tab's feed and fold the outcome into the state. The lock is
    /// only taken after the response is in.
    pub async fn refresh_tab(&self, tab: Tab) -> Result<(), FeedError> {
        let url = self.endpoint(tab);
        let outcome = match tab {
            Tab::Recs => self.feeds.fetch_recs(url).await.map(|recs| {
                self.icons.prefetch(recs.iter().map(|r| base_asset(&r.coin)));
                self.state.lock().apply_recs(recs);
            }),
            _ => self.feeds.fetch_listing(url).await.map(|listing| {
                self.icons.prefetch(listing.symbols().map(|s| base_asset(s)));
                self.state.lock().apply_listing(tab, listing);
            }),
        };

        if let Err(e) = &outcome {
            warn!(%tab, error = %e, "feed refresh failed");
            self.state.lock().record_failure(NoticeSource::Feed, FETCH_FAILED);
        }
        outcome
    }

    pub async fn refresh_whales(&self) -> Result<(), FeedError> {
        match self.feeds.fetch_signal(self.whale_min_usd).await {
            Ok(snapshot) => {
                self.state.lock().apply_whales(snapshot.whales);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "whale refresh failed");
                self.state.lock().record_failure(NoticeSource::Whales, FETCH_FAILED);
                Err(e)
            }
        }
    }

    /// Load every tab once so switching is instant from the start.
    pub async fn warm_up(&self) {
        for tab in Tab::ALL {
            let _ = self.refresh_tab(tab).await;
        }
        let _ = self.refresh_whales().await;
        info!("dashboard feeds loaded");
    }

    pub async fn select_tab(&self, tab: Tab) -> View {
        let refetch = self.state.lock().select_tab(tab);
        let _ = self.refresh_tab(refetch).await;
        self.view()
    }

    pub fn set_filter(&self, query: &str) -> View {
        self.state.lock().set_filter(query);
        self.view()
    }

    pub async fn refresh(&self) -> View {
        let _ = self.refresh_tab(self.current_tab()).await;
        self.view()
    }

    /// Returns the assistant reply (empty for blank input) and the view after
    /// the command ran.
    pub async fn chat(&self, text: &str) -> (String, View) {
        match interpret(text) {
            ChatCommand::Ignore => (String::new(), self.view()),
            ChatCommand::Refresh => {
                let reply = match self.refresh_tab(self.current_tab()).await {
                    Ok(()) => CHAT_REFRESH,
                    Err(_) => FETCH_FAILED,
                };
                (reply.to_string(), self.view())
            }
            ChatCommand::Filter(symbol) => {
                let view = self.set_filter(&symbol);
                (format!("Chenda: Filtering for {symbol}."), view)
            }
            ChatCommand::Help => (CHAT_HELP.to_string(), self.view()),
        }
    }

    /// Cards for the latest live snapshot.
    pub fn signals_panel(&self) -> Panel {
        let records = self.signals.borrow().clone();
        self.icons.prefetch(records.iter().map(|r| base_asset(&r.coin)));
        Panel {
            count: records.len(),
            html: render::render_signal_cards(&records, &self.icons, NO_SIGNALS),
        }
    }

    pub fn signals(&self) -> watch::Receiver<Vec<SignalRecord>> {
        self.signals.clone()
    }

    pub async fn usd_price(&self, base: &str) -> Option<f64> {
        self.feeds.fetch_usd_price(base).await
    }

    pub async fn raw(&self, kind: RawKind, symbol: Option<&str>) -> Result<Value, FeedError> {
        match kind {
            RawKind::Universe => self.feeds.fetch_universe().await,
            RawKind::Last => self.feeds.fetch_last().await,
            RawKind::Health => self.feeds.fetch_health().await,
            RawKind::Books => self.feeds.fetch_books(symbol.unwrap_or_default()).await,
        }
    }
}
