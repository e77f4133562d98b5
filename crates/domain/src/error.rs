//! Domain error types.

use thiserror::Error;

use crate::order::OrderStatus;

/// Errors raised while validating or transitioning an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// Post text is missing or blank.
    #[error("Post text is required")]
    TextRequired,

    /// Target group is missing.
    #[error("Group ID is required")]
    GroupIdRequired,

    /// Price is not a positive amount.
    #[error("Invalid price: {price} (must be greater than 0)")]
    InvalidPrice { price: String },

    /// Identifier does not pass the ERID format check.
    #[error("Invalid ERID format: {value}")]
    InvalidErid { value: String },

    /// Too many photos attached to one order.
    #[error("Too many photos: {count} (at most {max} allowed)")]
    TooManyPhotos { count: usize, max: usize },

    /// A photo exceeds the size limit.
    #[error("Photo {filename} is too large: {size} bytes (at most {max} allowed)")]
    PhotoTooLarge {
        filename: String,
        size: usize,
        max: usize,
    },

    /// A photo is not an image.
    #[error("Photo {filename} has unsupported type {mimetype}: only images are allowed")]
    UnsupportedMediaType { filename: String, mimetype: String },

    /// Unknown status string.
    #[error("Unknown order status: {value}")]
    UnknownStatus { value: String },

    /// The status machine does not allow this move.
    #[error("Invalid state transition: cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}
