use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{Erid, Order, OrderPhoto, OrderStatus};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    store::{
        OrderFilter, OrderPatch, OrderStore, OrderWithPhotos, PurgeReport, validate_field_patch,
        validate_transition,
    },
};

#[derive(Debug, Default)]
struct InMemoryState {
    orders: HashMap<OrderId, Order>,
    photos: Vec<OrderPhoto>,
}

/// In-memory order store implementation for testing and local runs.
///
/// This implementation keeps everything behind one lock and provides
/// the same guarantees as the PostgreSQL implementation, including
/// photo foreign-key checks and compare-and-set transitions.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the total number of photos stored.
    pub async fn photo_count(&self) -> usize {
        self.state.read().await.photos.len()
    }

    /// Clears all orders and photos.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.orders.clear();
        state.photos.clear();
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        let mut state = self.state.write().await;
        if state.orders.contains_key(&order.id) {
            return Err(StoreError::DuplicateOrder(order.id.clone()));
        }
        state.orders.insert(order.id.clone(), order.clone());
        Ok(())
    }

    async fn insert_photo(&self, photo: &OrderPhoto) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.orders.contains_key(&photo.order_id) {
            return Err(StoreError::OrderNotFound(photo.order_id.clone()));
        }
        state.photos.push(photo.clone());
        Ok(())
    }

    async fn get_order_with_photos(&self, id: &OrderId) -> Result<Option<OrderWithPhotos>> {
        let state = self.state.read().await;
        Ok(state.orders.get(id).map(|order| OrderWithPhotos {
            order: order.clone(),
            photos: state
                .photos
                .iter()
                .filter(|p| &p.order_id == id)
                .cloned()
                .collect(),
        }))
    }

    async fn update_order_fields(&self, id: &OrderId, patch: OrderPatch) -> Result<bool> {
        validate_field_patch(&patch)?;
        if patch.is_empty() {
            return Ok(false);
        }
        let mut state = self.state.write().await;
        match state.orders.get_mut(id) {
            Some(order) => {
                patch.apply_to(order);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_erid_once(&self, id: &OrderId, erid: &Erid) -> Result<Option<Erid>> {
        let mut state = self.state.write().await;
        Ok(state
            .orders
            .get_mut(id)
            .map(|order| order.erid.get_or_insert_with(|| erid.clone()).clone()))
    }

    async fn transition_status(
        &self,
        id: &OrderId,
        expected: OrderStatus,
        patch: OrderPatch,
    ) -> Result<Option<Order>> {
        validate_transition(expected, &patch)?;

        // Check and write under the same lock
        let mut state = self.state.write().await;
        match state.orders.get_mut(id) {
            Some(order) if order.status == expected => {
                patch.apply_to(order);
                Ok(Some(order.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            orders.truncate(limit as usize);
        }
        Ok(orders)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<PurgeReport> {
        let mut state = self.state.write().await;
        let expired: Vec<OrderId> = state
            .orders
            .values()
            .filter(|o| o.created_at < cutoff)
            .map(|o| o.id.clone())
            .collect();

        for id in &expired {
            state.orders.remove(id);
        }

        // Cascade to photos
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.photos)
            .into_iter()
            .partition(|p| expired.contains(&p.order_id));
        state.photos = kept;

        Ok(PurgeReport {
            orders_deleted: expired.len() as u64,
            photo_locators: removed.into_iter().map(|p| p.storage_locator).collect(),
        })
    }
}
