//! Read-only HTTP views of the published snapshot. Handlers only ever load
//! the current snapshot, so they never wait on the feed or the processor.

pub mod render;
mod routes;

pub use routes::router;

use crate::{Error, Result, snapshot::SnapshotStore};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Bind up front so a taken port aborts startup instead of surfacing later.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| Error::Bind { addr, source })
}

/// Serve until `shutdown_listener` fires, letting in-flight requests finish.
pub async fn serve(
    listener: TcpListener,
    store: Arc<SnapshotStore>,
    shutdown_listener: CancellationToken,
) -> Result<()> {
    let local_addr = listener.local_addr().map_err(Error::Serve)?;
    info!(%local_addr, "http server listening");

    axum::serve(listener, router(store))
        .with_graceful_shutdown(async move { shutdown_listener.cancelled().await })
        .await
        .map_err(Error::Serve)?;

    info!("shutdown signal detected; http server stopped");
    Ok(())
}
