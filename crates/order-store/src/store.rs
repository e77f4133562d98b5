use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{Erid, Order, OrderPhoto, OrderStatus};

use crate::{Result, StoreError};

/// Field-level update of an order.
///
/// Only fields set to `Some` are written; `None` leaves the stored value
/// untouched, it never clears a column. An `erid` is only written when the
/// order has none yet. `status` is honoured by `transition_status` alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
    pub erid: Option<Erid>,
    pub payment_id: Option<String>,
    pub post_id: Option<i64>,
    pub last_error: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
}

impl OrderPatch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn erid(mut self, erid: Erid) -> Self {
        self.erid = Some(erid);
        self
    }

    pub fn payment_id(mut self, payment_id: Option<String>) -> Self {
        self.payment_id = payment_id;
        self
    }

    pub fn post_id(mut self, post_id: i64) -> Self {
        self.post_id = Some(post_id);
        self
    }

    pub fn last_error(mut self, reason: impl Into<String>) -> Self {
        self.last_error = Some(reason.into());
        self
    }

    pub fn paid_at(mut self, at: DateTime<Utc>) -> Self {
        self.paid_at = Some(at);
        self
    }

    pub fn published_at(mut self, at: DateTime<Utc>) -> Self {
        self.published_at = Some(at);
        self
    }

    /// Returns true if the patch would not change anything.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Writes every `Some` field onto `order`.
    pub fn apply_to(&self, order: &mut Order) {
        if let Some(status) = self.status {
            order.status = status;
        }
        if let Some(erid) = &self.erid {
            order.erid.get_or_insert_with(|| erid.clone());
        }
        if let Some(payment_id) = &self.payment_id {
            order.payment_id = Some(payment_id.clone());
        }
        if let Some(post_id) = self.post_id {
            order.post_id = Some(post_id);
        }
        if let Some(reason) = &self.last_error {
            order.last_error = Some(reason.clone());
        }
        if let Some(at) = self.paid_at {
            order.paid_at = Some(at);
        }
        if let Some(at) = self.published_at {
            order.published_at = Some(at);
        }
    }
}

/// Filters for listing orders. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub group_id: Option<i64>,
    pub user_id: Option<i64>,
    pub limit: Option<u32>,
}

impl OrderFilter {
    /// Creates a filter matching all orders.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn group_id(mut self, group_id: i64) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if `order` passes every set filter.
    pub fn matches(&self, order: &Order) -> bool {
        self.status.is_none_or(|s| order.status == s)
            && self.group_id.is_none_or(|g| order.group_id == g)
            && self.user_id.is_none_or(|u| order.user_id == Some(u))
    }
}

/// An order together with its photos.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderWithPhotos {
    pub order: Order,
    pub photos: Vec<OrderPhoto>,
}

/// Outcome of a retention purge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// Number of order rows removed.
    pub orders_deleted: u64,

    /// Media locators of the photos removed with those orders.
    pub photo_locators: Vec<String>,
}

/// Durable store for orders and their photos.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts a new order. Fails with `DuplicateOrder` if the id exists.
    async fn insert_order(&self, order: &Order) -> Result<()>;

    /// Inserts a photo row. Fails with `OrderNotFound` if the owning order
    /// does not exist.
    async fn insert_photo(&self, photo: &OrderPhoto) -> Result<()>;

    /// Loads an order and its photos, in insertion order.
    async fn get_order_with_photos(&self, id: &OrderId) -> Result<Option<OrderWithPhotos>>;

    /// Applies a field-level update.
    ///
    /// Fails with `StatusUpdate` if the patch carries a status. Returns
    /// false if the order does not exist or the patch is empty.
    async fn update_order_fields(&self, id: &OrderId, patch: OrderPatch) -> Result<bool>;

    /// Stores `erid` unless the order already has one.
    ///
    /// Returns the identifier the order ends up with, or `None` if the
    /// order does not exist.
    async fn set_erid_once(&self, id: &OrderId, erid: &Erid) -> Result<Option<Erid>>;

    /// Compare-and-set status change.
    ///
    /// Applies `patch` (which must carry the target status) only if the
    /// order's current status equals `expected`. Returns the updated order,
    /// or `None` if the order is missing or its status has already moved.
    async fn transition_status(
        &self,
        id: &OrderId,
        expected: OrderStatus,
        patch: OrderPatch,
    ) -> Result<Option<Order>>;

    /// Lists orders matching `filter`, newest first.
    async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>>;

    /// Deletes orders created before `cutoff` together with their photos.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<PurgeReport>;
}

/// Extension trait providing convenience methods for order stores.
#[async_trait]
pub trait OrderStoreExt: OrderStore {
    /// Loads an order without its photos.
    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>> {
        Ok(self.get_order_with_photos(id).await?.map(|o| o.order))
    }

    /// Checks if an order exists.
    async fn order_exists(&self, id: &OrderId) -> Result<bool> {
        Ok(self.get_order_with_photos(id).await?.is_some())
    }
}

// Blanket implementation for all OrderStore implementations
impl<T: OrderStore + ?Sized> OrderStoreExt for T {}

#[async_trait]
impl<T: OrderStore + ?Sized> OrderStore for Arc<T> {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        (**self).insert_order(order).await
    }

    async fn insert_photo(&self, photo: &OrderPhoto) -> Result<()> {
        (**self).insert_photo(photo).await
    }

    async fn get_order_with_photos(&self, id: &OrderId) -> Result<Option<OrderWithPhotos>> {
        (**self).get_order_with_photos(id).await
    }

    async fn update_order_fields(&self, id: &OrderId, patch: OrderPatch) -> Result<bool> {
        (**self).update_order_fields(id, patch).await
    }

    async fn set_erid_once(&self, id: &OrderId, erid: &Erid) -> Result<Option<Erid>> {
        (**self).set_erid_once(id, erid).await
    }

    async fn transition_status(
        &self,
        id: &OrderId,
        expected: OrderStatus,
        patch: OrderPatch,
    ) -> Result<Option<Order>> {
        (**self).transition_status(id, expected, patch).await
    }

    async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>> {
        (**self).list_orders(filter).await
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<PurgeReport> {
        (**self).delete_older_than(cutoff).await
    }
}

/// Rejects a field-level patch that tries to move the status.
pub fn validate_field_patch(patch: &OrderPatch) -> Result<()> {
    match patch.status {
        Some(status) => Err(StoreError::StatusUpdate(status)),
        None => Ok(()),
    }
}

/// Checks that a transition patch names a target the status machine allows
/// from `expected`, and returns that target.
pub fn validate_transition(expected: OrderStatus, patch: &OrderPatch) -> Result<OrderStatus> {
    let target = patch.status.ok_or(StoreError::Transition(
        domain::OrderError::InvalidTransition {
            from: expected,
            to: expected,
        },
    ))?;
    expected.ensure_transition(target)?;
    Ok(target)
}
