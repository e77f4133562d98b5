use common::OrderId;
use domain::{OrderError, OrderStatus};
use thiserror::Error;

/// Errors that can occur when interacting with the order or media store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced order does not exist. Also returned when a photo
    /// insert points at a missing order.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// An order with this id was already inserted.
    #[error("Order already exists: {0}")]
    DuplicateOrder(OrderId),

    /// No blob is stored under the locator.
    #[error("Media not found: {0}")]
    MediaNotFound(String),

    /// A requested status change is not in the transition table.
    #[error("Rejected transition: {0}")]
    Transition(#[from] OrderError),

    /// A field update tried to change the status outside a transition.
    #[error("Status change to {0} must go through a transition")]
    StatusUpdate(OrderStatus),

    /// A stored row could not be mapped back to the domain model.
    #[error("Corrupt record for order {order_id}: {reason}")]
    Corrupt { order_id: String, reason: String },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A filesystem error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
