use super::peers::PeerIndexView;
use super::service::Overlay;
use crate::storage::key::Key;
use crate::storage::protocol::DhtGetResponse;

use axum::{
    Extension, Json,
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::future::join_all;
use std::sync::Arc;

pub async fn handle_dht_debug(Extension(overlay): Extension<Arc<dyn Overlay>>) -> String {
    overlay.status()
}

pub async fn handle_dht_ping(
    Extension(overlay): Extension<Arc<dyn Overlay>>,
) -> (StatusCode, Json<Vec<String>>) {
    let nodes = overlay.nodes();
    let results = join_all(nodes.iter().map(|node| overlay.ping(node.addr))).await;

    let lines = nodes
        .iter()
        .zip(results)
        .map(|(node, result)| match result {
            Ok(id) => format!("{}: {}", node.addr, id),
            Err(e) => format!("{}: {}", node.addr, e),
        })
        .collect();

    (StatusCode::OK, Json(lines))
}

pub async fn handle_dht_get(
    Extension(overlay): Extension<Arc<dyn Overlay>>,
    Extension(peers): Extension<Arc<dyn PeerIndexView>>,
    Path(key_str): Path<String>,
) -> Response {
    let key = match Key::encode(&key_str) {
        Ok(k) => k,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    let Some(peer) = peers.peers_for(&key).first().copied() else {
        return (StatusCode::NOT_FOUND, format!("no peers for {}", key_str)).into_response();
    };

    match overlay.fetch(peer, key).await {
        Ok(Some(value)) => (
            StatusCode::OK,
            Json(DhtGetResponse {
                peer: peer.to_string(),
                key: key_str,
                value: String::from_utf8_lossy(&value).into_owned(),
            }),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            format!("peer {} has no value for {}", peer, key_str),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Raw fetch of {} from {} failed: {}", key_str, peer, e);
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}
