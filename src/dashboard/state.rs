// ============================================================================
// Tab / filter state of the dashboard, kept as a plain value so every
// transition can be tested without a server
// ============================================================================

use crate::feed::{ExchangeListing, SignalRecord, WhaleRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    New,
    Top,
    #[default]
    Future,
    Recs,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::New, Tab::Top, Tab::Future, Tab::Recs];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Top => "top",
            Self::Future => "future",
            Self::Recs => "recs",
        }
    }

    /// Chip tag for listing tabs, `None` for the recommendations tab.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            Self::New => Some("NEW"),
            Self::Top => Some("TOP"),
            Self::Future => Some("FUTURE"),
            Self::Recs => None,
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTab(pub String);

impl fmt::Display for UnknownTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown tab {:?}", self.0)
    }
}

impl std::error::Error for UnknownTab {}

impl FromStr for Tab {
    type Err = UnknownTab;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "new" => Ok(Self::New),
            "top" => Ok(Self::Top),
            "future" => Ok(Self::Future),
            "recs" => Ok(Self::Recs),
            other => Err(UnknownTab(other.to_string())),
        }
    }
}

/// Where a failed fetch came from. Each source only clears its own notice, so
/// a healthy whale table never hides a broken tab feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeSource {
    Feed,
    Whales,
}

#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    tab: Tab,
    filter: String,
    new: ExchangeListing,
    top: ExchangeListing,
    future: ExchangeListing,
    recs: Vec<SignalRecord>,
    whales: Vec<WhaleRecord>,
    last_updated: Option<DateTime<Utc>>,
    feed_notice: Option<String>,
    whale_notice: Option<String>,
}

impl DashboardState {
    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn recs(&self) -> &[SignalRecord] {
        &self.recs
    }

    pub fn whales(&self) -> &[WhaleRecord] {
        &self.whales
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// The tab feed's notice wins over the whale table's.
    pub fn notice(&self) -> Option<&str> {
        self.feed_notice.as_deref().or(self.whale_notice.as_deref())
    }

    /// Switch tab. Returns the tab whose feed has to be fetched again.
    pub fn select_tab(&mut self, tab: Tab) -> Tab {
        self.tab = tab;
        tab
    }

    /// Text filter over symbols. Purely local: never implies a fetch.
    pub fn set_filter(&mut self, query: &str) {
        self.filter = query.trim().to_string();
    }

    pub fn listing(&self, tab: Tab) -> Option<&ExchangeListing> {
        match tab {
            Tab::New => Some(&self.new),
            Tab::Top => Some(&self.top),
            Tab::Future => Some(&self.future),
            Tab::Recs => None,
        }
    }

    /// Listing of the current tab with the filter applied. Empty on the recs tab.
    pub fn visible_listing(&self) -> ExchangeListing {
        self.listing(self.tab)
            .map(|listing| listing.filtered(&self.filter))
            .unwrap_or_default()
    }

    /// Replace a listing tab's data wholesale. Ignored for [`Tab::Recs`].
    pub fn apply_listing(&mut self, tab: Tab, listing: ExchangeListing) {
        let slot = match tab {
            Tab::New => &mut self.new,
            Tab::Top => &mut self.top,
            Tab::Future => &mut self.future,
            Tab::Recs => return,
        };
        *slot = listing;
        self.mark_updated(NoticeSource::Feed);
    }

    pub fn apply_recs(&mut self, recs: Vec<SignalRecord>) {
        self.recs = recs;
        self.mark_updated(NoticeSource::Feed);
    }

    pub fn apply_whales(&mut self, whales: Vec<WhaleRecord>) {
        self.whales = whales;
        self.mark_updated(NoticeSource::Whales);
    }

    /// A fetch failed: keep whatever we had and tell the user.
    pub fn record_failure(&mut self, source: NoticeSource, message: impl Into<String>) {
        *self.notice_slot(source) = Some(message.into());
    }

    fn mark_updated(&mut self, source: NoticeSource) {
        self.last_updated = Some(Utc::now());
        *self.notice_slot(source) = None;
    }

    fn notice_slot(&mut self, source: NoticeSource) -> &mut Option<String> {
        match source {
            NoticeSource::Feed => &mut self.feed_notice,
            NoticeSource::Whales => &mut self.whale_notice,
        }
    }
}

// ============================================================================
// Chat shortcuts
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Refresh,
    Filter(String),
    Help,
    Ignore,
}

/// `refresh` refetches, `show <coin>` filters, anything else gets the help line.
pub fn interpret(text: &str) -> ChatCommand {
    let text = text.trim();
    if text.is_empty() {
        return ChatCommand::Ignore;
    }

    let lower = text.to_lowercase();
    if lower == "refresh" {
        return ChatCommand::Refresh;
    }

    let mut words = lower.split_whitespace();
    if words.next() == Some("show") {
        if let Some(target) = words.next() {
            let symbol: String = target.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
            if !symbol.is_empty() {
                return ChatCommand::Filter(symbol.to_uppercase());
            }
        }
    }
    ChatCommand::Help
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(kraken: &[&str], binance: &[&str]) -> ExchangeListing {
        ExchangeListing {
            kraken: kraken.iter().map(|s| s.to_string()).collect(),
            binance: binance.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_tab_parse_and_default() {
        assert_eq!(Tab::default(), Tab::Future);
        for tab in Tab::ALL {
            assert_eq!(tab.as_str().parse::<Tab>().unwrap(), tab);
        }
        assert_eq!(" TOP ".parse::<Tab>().unwrap(), Tab::Top);
        assert!("gainers".parse::<Tab>().is_err());
    }

    #[test]
    fn test_select_tab_requests_matching_feed() {
        let mut state = DashboardState::default();
        assert_eq!(state.select_tab(Tab::Top), Tab::Top);
        assert_eq!(state.tab(), Tab::Top);
        assert_eq!(state.select_tab(Tab::Recs), Tab::Recs);
        assert!(state.visible_listing().is_empty());
    }

    #[test]
    fn test_filter_is_independent_of_tab() {
        let mut state = DashboardState::default();
        state.apply_listing(Tab::New, listing(&["XRPUSD", "ADAUSD"], &["xrpusdt"]));
        state.apply_listing(Tab::Top, listing(&["XRPEUR"], &["SOLUSDT"]));
        state.set_filter("  Xrp ");
        assert_eq!(state.filter(), "Xrp");

        state.select_tab(Tab::New);
        assert_eq!(state.visible_listing(), listing(&["XRPUSD"], &["xrpusdt"]));

        state.select_tab(Tab::Top);
        assert_eq!(state.visible_listing(), listing(&["XRPEUR"], &[]));

        state.set_filter("");
        assert_eq!(state.visible_listing(), listing(&["XRPEUR"], &["SOLUSDT"]));
    }

    #[test]
    fn test_failure_keeps_previous_data() {
        let mut state = DashboardState::default();
        state.apply_listing(Tab::Future, listing(&["XRPUSD"], &[]));
        let updated = state.last_updated();
        assert!(updated.is_some());

        state.record_failure(NoticeSource::Feed, "HTTP 503");
        assert_eq!(state.notice(), Some("HTTP 503"));
        assert_eq!(state.visible_listing(), listing(&["XRPUSD"], &[]));
        assert_eq!(state.last_updated(), updated);

        state.apply_listing(Tab::Future, listing(&[], &[]));
        assert_eq!(state.notice(), None);
        assert!(state.visible_listing().is_empty());
    }

    #[test]
    fn test_whale_success_keeps_feed_notice() {
        let mut state = DashboardState::default();
        state.record_failure(NoticeSource::Feed, "feed down");
        state.apply_whales(Vec::new());
        assert_eq!(state.notice(), Some("feed down"));

        state.record_failure(NoticeSource::Whales, "signal down");
        state.apply_recs(Vec::new());
        assert_eq!(state.notice(), Some("signal down"));

        state.apply_whales(Vec::new());
        assert_eq!(state.notice(), None);
    }

    #[test]
    fn test_apply_listing_ignores_recs_tab() {
        let mut state = DashboardState::default();
        state.apply_listing(Tab::Recs, listing(&["XRPUSD"], &[]));
        assert!(state.last_updated().is_none());
        assert!(state.listing(Tab::Recs).is_none());
    }

    #[test]
    fn test_chat_shortcuts() {
        assert_eq!(interpret("  "), ChatCommand::Ignore);
        assert_eq!(interpret("REFRESH"), ChatCommand::Refresh);
        assert_eq!(interpret("show xrp"), ChatCommand::Filter("XRP".to_string()));
        assert_eq!(interpret("Show  sol!"), ChatCommand::Filter("SOL".to_string()));
        assert_eq!(interpret("show"), ChatCommand::Help);
        assert_eq!(interpret("what is up"), ChatCommand::Help);
    }
}
