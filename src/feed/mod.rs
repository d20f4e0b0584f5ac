// ============================================================================
// Feed client and the adapters that turn every upstream response shape into
// the dashboard's view models
// ============================================================================

pub mod client;
pub mod shape;
pub mod signal;

pub use client::{FeedClient, DEFAULT_FEED_TIMEOUT};
pub use shape::{Exchange, ExchangeListing, FeedShape};
pub use signal::{Action, SignalRecord, SignalSnapshot, WhaleRecord};
