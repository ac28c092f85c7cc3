use super::service::{FederatedLookup, LookupError};
use crate::storage::protocol::GetManyParams;

use axum::{
    Json,
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

pub async fn handle_get_many(
    Extension(lookup): Extension<Arc<FederatedLookup>>,
    Query(params): Query<GetManyParams>,
) -> Response {
    let prefix = params.prefix.unwrap_or_default();

    match lookup.get_many(&prefix).await {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(e) => {
            tracing::error!("getMany '{}' failed: {}", prefix, e);
            let status = match e {
                LookupError::PeerFetch { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                LookupError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            };
            (status, e.to_string()).into_response()
        }
    }
}
