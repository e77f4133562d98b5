//! Lifecycle error types.

use std::time::Duration;

use common::OrderId;
use domain::{OrderError, OrderStatus};
use order_store::StoreError;
use thiserror::Error;

/// Errors that cross the lifecycle controller boundary.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Intake data or an identifier failed validation.
    #[error("Validation failed: {0}")]
    Validation(#[from] OrderError),

    /// No order with this id.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// Payment was already confirmed for this order.
    #[error("Order already paid: {0}")]
    AlreadyPaid(OrderId),

    /// The order is not in the status the operation requires.
    #[error("Order {order_id} is {status}, expected {required}")]
    InvalidState {
        order_id: OrderId,
        status: OrderStatus,
        required: OrderStatus,
    },

    /// The media host rejected or failed the post.
    #[error("Publish failed: {0}")]
    PublishFailed(String),

    /// Persistence failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience type alias for lifecycle results.
pub type Result<T> = std::result::Result<T, LifecycleError>;

/// Failures talking to the compliance authority.
///
/// These never leave the resolver; they select the fallback branch.
#[derive(Debug, Error)]
pub enum ComplianceError {
    #[error("Compliance authority unreachable: {0}")]
    Unreachable(String),

    #[error("Compliance authority did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Compliance authority error {code}: {message}")]
    Rejected { code: i64, message: String },

    #[error("Compliance authority response carries no identifier")]
    MissingIdentifier,

    #[error("Compliance authority returned an invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failures talking to the media host.
#[derive(Debug, Error)]
pub enum MediaHostError {
    #[error("Media host unreachable: {0}")]
    Unreachable(String),

    #[error("Media host did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Media host error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Unexpected media host response: {0}")]
    Malformed(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
