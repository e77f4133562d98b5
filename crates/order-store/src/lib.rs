//! Persistence for orders, their photos and the photo bytes.
//!
//! `OrderStore` is the durable record of orders with field-level updates
//! and compare-and-set status transitions. `MediaStore` holds the raw
//! photo bytes the order rows point at.

pub mod error;
pub mod media;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use media::{FsMediaStore, InMemoryMediaStore, MediaStore};
pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;
pub use store::{
    OrderFilter, OrderPatch, OrderStore, OrderStoreExt, OrderWithPhotos, PurgeReport,
    validate_field_patch, validate_transition,
};
