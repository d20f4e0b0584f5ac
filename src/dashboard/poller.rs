// ============================================================================
// Background tasks: the feed poll loop and the live signal subscription
// ============================================================================

use super::Dashboard;
use crate::feed::signal::from_documents;
use crate::feed::SignalRecord;
use crate::store::{CollectionQuery, DocumentStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Refresh the current tab and the whale table, then sleep. Ticks never
/// overlap: the next one starts `interval` after the previous one finished.
pub async fn run_poller(dashboard: Dashboard, interval: Duration) {
    info!(interval_ms = interval.as_millis() as u64, "poller started");
    loop {
        sleep(interval).await;
        let tab = dashboard.current_tab();
        let tab_ok = dashboard.refresh_tab(tab).await.is_ok();
        let whales_ok = dashboard.refresh_whales().await.is_ok();
        debug!(%tab, tab_ok, whales_ok, "poll tick");
    }
}

/// Keep `tx` filled with the signal records matching `query`, newest first.
///
/// The change feed is subscribed before the first snapshot, so an append that
/// lands in between is never missed. Ends when the store drops its sender or
/// every receiver is gone.
pub async fn run_signal_subscription(
    store: Arc<dyn DocumentStore>,
    query: CollectionQuery,
    tx: watch::Sender<Vec<SignalRecord>>,
) {
    let mut changes = store.subscribe();
    publish(store.as_ref(), &query, &tx).await;

    loop {
        if tx.is_closed() {
            debug!("no signal viewers left, subscription ends");
            return;
        }
        match changes.recv().await {
            Ok(event) if query.matches(&event.collection) => {
                publish(store.as_ref(), &query, &tx).await;
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "signal subscription lagged, re-reading snapshot");
                publish(store.as_ref(), &query, &tx).await;
            }
            Err(broadcast::error::RecvError::Closed) => {
                info!("store change feed closed");
                return;
            }
        }
    }
}

async fn publish(
    store: &dyn DocumentStore,
    query: &CollectionQuery,
    tx: &watch::Sender<Vec<SignalRecord>>,
) {
    match store.snapshot(query).await {
        Ok(docs) => {
            let records = from_documents(&docs);
            debug!(count = records.len(), "live signals updated");
            tx.send_replace(records);
        }
        Err(e) => warn!(error = %e, "signal snapshot failed, keeping previous"),
    }
}
