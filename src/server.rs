//! HTTP Server
//!
//! Assembles the public API and the overlay debug endpoints into one axum
//! router. Handlers receive their collaborators through `Extension` layers.

use crate::lookup::FederatedLookup;
use crate::lookup::handlers::handle_get_many;
use crate::overlay::handlers::{handle_dht_debug, handle_dht_get, handle_dht_ping};
use crate::overlay::{Overlay, PeerIndexView};
use crate::publication::PublicationCoordinator;
use crate::publication::handlers::handle_put;
use crate::storage::protocol::*;

use axum::{
    Router,
    extract::Extension,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Everything the request handlers share.
#[derive(Clone)]
pub struct AppState {
    pub peers: Arc<dyn PeerIndexView>,
    pub overlay: Arc<dyn Overlay>,
    pub coordinator: Arc<PublicationCoordinator>,
    pub lookup: Arc<FederatedLookup>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(ENDPOINT_PUT, post(handle_put))
        .route(&format!("{}/", ENDPOINT_PUT), post(handle_put))
        .route(ENDPOINT_GET_MANY, get(handle_get_many))
        .route(&format!("{}/", ENDPOINT_GET_MANY), get(handle_get_many))
        .route(ENDPOINT_DHT_DEBUG, get(handle_dht_debug))
        .route(ENDPOINT_DHT_PING, get(handle_dht_ping))
        .route(&format!("{}/:key", ENDPOINT_DHT_GET), get(handle_dht_get))
        .layer(Extension(state.coordinator))
        .layer(Extension(state.lookup))
        .layer(Extension(state.overlay))
        .layer(Extension(state.peers))
}

/// Serves `app` until the shutdown token is cancelled.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    tracing::info!("HTTP server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}
