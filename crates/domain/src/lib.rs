//! Domain layer for the paid post order service.
//!
//! This crate provides the core domain types:
//! - `Order` and `OrderPhoto` records with the forward-only status machine
//! - `Price` with minor-unit conversion for payment and compliance boundaries
//! - `Erid` validation and fallback identifier synthesis
//! - Post body formatting with the advertising disclosure block

pub mod error;
pub mod order;

pub use error::OrderError;
pub use order::{
    DISCLOSURE_LABEL, Erid, MAX_PHOTO_BYTES, MAX_PHOTOS, NewOrder, Order, OrderPhoto, OrderStatus,
    PhotoUpload, Price, format_post_body,
};
