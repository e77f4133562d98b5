//! Order records and the rules that govern them.

mod erid;
mod model;
mod post;
mod state;
mod value_objects;

pub use erid::{Erid, FALLBACK_PREFIX};
pub use model::{NewOrder, Order, OrderPhoto};
pub use post::{DISCLOSURE_LABEL, ERID_MARKER, format_post_body};
pub use state::OrderStatus;
pub use value_objects::{MAX_PHOTO_BYTES, MAX_PHOTOS, PhotoUpload, Price};
