//! Order and photo records.

use chrono::{DateTime, Utc};
use common::OrderId;
use serde::{Deserialize, Serialize};

use super::{Erid, OrderStatus, PhotoUpload, Price};
use crate::error::OrderError;

/// Intake data for a new order, validated by [`Order::pending`].
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// Post body as written by the advertiser.
    pub text: String,

    /// Target community.
    pub group_id: i64,

    /// Requesting user, when known.
    pub user_id: Option<i64>,

    /// Placement price.
    pub price: Price,

    /// Identifier supplied by the advertiser, skips registration.
    pub custom_erid: Option<String>,

    /// Attached images.
    pub photos: Vec<PhotoUpload>,
}

impl NewOrder {
    /// Creates intake data with the default price and no photos.
    pub fn new(text: impl Into<String>, group_id: i64) -> Self {
        Self {
            text: text.into(),
            group_id,
            user_id: None,
            price: Price::default(),
            custom_erid: None,
            photos: Vec::new(),
        }
    }

    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_price(mut self, price: Price) -> Self {
        self.price = price;
        self
    }

    pub fn with_custom_erid(mut self, erid: impl Into<String>) -> Self {
        self.custom_erid = Some(erid.into());
        self
    }

    pub fn with_photo(mut self, photo: PhotoUpload) -> Self {
        self.photos.push(photo);
        self
    }
}

/// One paid post placement, from intake through publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub text: String,
    pub group_id: i64,
    pub user_id: Option<i64>,
    pub price: Price,
    pub custom_erid: Option<Erid>,

    /// Identifier used in the published post. Written once.
    pub erid: Option<Erid>,

    pub status: OrderStatus,
    pub payment_id: Option<String>,
    pub post_id: Option<i64>,

    /// Reason of the most recent failed publish attempt.
    pub last_error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Validates intake data and builds a fresh `Pending` order.
    ///
    /// Photos are validated here too but are not part of the record; they
    /// are stored separately as [`OrderPhoto`] rows.
    pub fn pending(new: &NewOrder) -> Result<Self, OrderError> {
        if new.text.trim().is_empty() {
            return Err(OrderError::TextRequired);
        }
        if new.group_id == 0 {
            return Err(OrderError::GroupIdRequired);
        }
        let custom_erid = match new.custom_erid.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(value) => Some(Erid::parse(value)?),
        };
        PhotoUpload::validate_all(&new.photos)?;

        Ok(Self {
            id: OrderId::generate(),
            text: new.text.clone(),
            group_id: new.group_id,
            user_id: new.user_id,
            price: new.price,
            custom_erid,
            erid: None,
            status: OrderStatus::Pending,
            payment_id: None,
            post_id: None,
            last_error: None,
            created_at: Utc::now(),
            paid_at: None,
            published_at: None,
        })
    }

    /// Site reference used when registering the ad.
    pub fn site_reference(&self) -> String {
        format!("vk.com/club{}", self.group_id.unsigned_abs())
    }
}

/// A photo belonging to exactly one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPhoto {
    pub order_id: OrderId,
    pub filename: String,
    pub mimetype: String,

    /// Opaque reference into media storage.
    pub storage_locator: String,
}
