//! Value objects for the order domain.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::OrderError;

/// Maximum number of photos attached to one order.
pub const MAX_PHOTOS: usize = 10;

/// Maximum size of a single photo (10 MiB).
pub const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;

/// Upper bound on a price, keeps minor-unit conversion inside `i64`.
const MAX_PRICE: i64 = 1_000_000_000;

/// Digits after the decimal point a price may carry (kopecks).
const PRICE_SCALE: u32 = 2;

/// Placement price, a positive decimal amount in major currency units.
///
/// The stored value is never rewritten; conversion to minor units happens
/// only where an external party needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Creates a price, rejecting zero, negative and absurdly large amounts,
    /// and amounts finer than one kopeck.
    pub fn new(amount: Decimal) -> Result<Self, OrderError> {
        if amount <= Decimal::ZERO
            || amount > Decimal::from(MAX_PRICE)
            || amount.normalize().scale() > PRICE_SCALE
        {
            return Err(OrderError::InvalidPrice {
                price: amount.to_string(),
            });
        }
        Ok(Self(amount))
    }

    /// Price used when the request does not carry one.
    pub fn default_placement() -> Self {
        Self(Decimal::from(100))
    }

    /// Returns the decimal amount.
    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns the amount in minor units (kopecks), rounded half away from zero.
    pub fn minor_units(&self) -> i64 {
        (self.0 * Decimal::from(100))
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(MAX_PRICE * 100)
    }
}

impl Default for Price {
    fn default() -> Self {
        Self::default_placement()
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Price {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = s
            .trim()
            .parse::<Decimal>()
            .map_err(|_| OrderError::InvalidPrice {
                price: s.to_string(),
            })?;
        Self::new(amount)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = OrderError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

/// A photo received at intake, before it is written to media storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoUpload {
    /// Original file name as sent by the client.
    pub filename: String,

    /// Declared MIME type.
    pub mimetype: String,

    /// Raw image bytes.
    pub bytes: Vec<u8>,
}

impl PhotoUpload {
    /// Creates a new photo upload.
    pub fn new(filename: impl Into<String>, mimetype: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mimetype: mimetype.into(),
            bytes,
        }
    }

    /// Checks the MIME type and size limits.
    pub fn validate(&self) -> Result<(), OrderError> {
        if !self.mimetype.starts_with("image/") {
            return Err(OrderError::UnsupportedMediaType {
                filename: self.filename.clone(),
                mimetype: self.mimetype.clone(),
            });
        }
        if self.bytes.len() > MAX_PHOTO_BYTES {
            return Err(OrderError::PhotoTooLarge {
                filename: self.filename.clone(),
                size: self.bytes.len(),
                max: MAX_PHOTO_BYTES,
            });
        }
        Ok(())
    }

    /// Validates a whole batch of photos.
    pub fn validate_all(photos: &[PhotoUpload]) -> Result<(), OrderError> {
        if photos.len() > MAX_PHOTOS {
            return Err(OrderError::TooManyPhotos {
                count: photos.len(),
                max: MAX_PHOTOS,
            });
        }
        photos.iter().try_for_each(PhotoUpload::validate)
    }
}
