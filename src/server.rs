// ============================================================================
// Shared server plumbing: logging, port scan, graceful shutdown
// ============================================================================

use crate::error::{Error, Result};
use futures::FutureExt;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use tracing::{error, info, warn};
use warp::{Filter, Reply};

/// How many ports after the configured one are tried before giving up.
pub const PORT_SCAN: u16 = 10;

pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Resolves on Ctrl-C. If the handler cannot be installed it never resolves.
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => {
            error!(error = %e, "could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}

/// Serve `routes` on the first free port in `port..=port + PORT_SCAN` and run
/// until `shutdown` resolves.
pub async fn serve<F, S>(name: &str, routes: F, host: &str, port: u16, shutdown: S) -> Result<()>
where
    F: Filter<Error = warp::Rejection> + Clone + Send + Sync + 'static,
    F::Extract: Reply,
    S: Future<Output = ()> + Send + 'static,
{
    let ip: IpAddr = host.parse().map_err(|_| Error::Host(host.to_string()))?;
    let shutdown = shutdown.shared();
    let last = port.saturating_add(PORT_SCAN);

    for candidate in port..=last {
        let addr = SocketAddr::new(ip, candidate);
        match warp::serve(routes.clone()).try_bind_with_graceful_shutdown(addr, shutdown.clone()) {
            Ok((bound, server)) => {
                info!(%bound, "{name} listening on http://{bound}");
                server.await;
                info!("{name} stopped");
                return Ok(());
            }
            Err(e) => warn!(port = candidate, error = %e, "port busy, trying next"),
        }
    }

    Err(Error::Bind {
        host: host.to_string(),
        first: port,
        last,
    })
}
