//! API error types with HTTP response mapping.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lifecycle::LifecycleError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),

    /// Malformed or oversized multipart body.
    #[error(transparent)]
    Multipart(#[from] MultipartError),

    /// Lifecycle operation error.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Multipart(err) => (err.status(), err.body_text()),
            ApiError::Lifecycle(err) => lifecycle_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn lifecycle_error_to_response(err: LifecycleError) -> (StatusCode, String) {
    let status = match &err {
        LifecycleError::Validation(_) => StatusCode::BAD_REQUEST,
        LifecycleError::NotFound(_) => StatusCode::NOT_FOUND,
        LifecycleError::AlreadyPaid(_) | LifecycleError::InvalidState { .. } => {
            StatusCode::CONFLICT
        }
        LifecycleError::PublishFailed(_) => StatusCode::BAD_GATEWAY,
        LifecycleError::Store(_) => {
            tracing::error!(error = %err, "internal server error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderId;
    use domain::{OrderError, OrderStatus};
    use order_store::StoreError;

    fn status_of(err: LifecycleError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_lifecycle_status_mapping() {
        let id = OrderId::new("order_1");
        assert_eq!(
            status_of(LifecycleError::Validation(OrderError::TextRequired)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(LifecycleError::NotFound(id.clone())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(LifecycleError::AlreadyPaid(id.clone())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(LifecycleError::InvalidState {
                order_id: id.clone(),
                status: OrderStatus::Pending,
                required: OrderStatus::Paid,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(LifecycleError::PublishFailed("denied".to_string())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(LifecycleError::Store(StoreError::OrderNotFound(id))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_bad_request() {
        let response = ApiError::BadRequest("group_id must be an integer".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
