use super::service::{PublicationCoordinator, PublishError};
use crate::storage::protocol::PutRequest;

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
};
use std::sync::Arc;

pub fn status_for(error: &PublishError) -> StatusCode {
    match error {
        PublishError::InvalidKey(_) | PublishError::ValueTooLarge { .. } => {
            StatusCode::BAD_REQUEST
        }
        PublishError::Conflict(_) => StatusCode::FORBIDDEN,
        PublishError::StoreFailure { .. }
        | PublishError::AnnounceFailure { .. }
        | PublishError::AnnounceTimeout { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        PublishError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub async fn handle_put(
    Extension(coordinator): Extension<Arc<PublicationCoordinator>>,
    body: Result<Json<PutRequest>, JsonRejection>,
) -> (StatusCode, String) {
    let Json(req) = match body {
        Ok(req) => req,
        Err(rejection) => {
            tracing::debug!("Rejected put body: {}", rejection);
            return (StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    match coordinator.put(&req.key, req.value).await {
        Ok(()) => (StatusCode::OK, String::new()),
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                tracing::error!("Failed to put {}: {}", req.key, e);
            } else {
                tracing::debug!("Rejected put {}: {}", req.key, e);
            }
            (status, e.to_string())
        }
    }
}
