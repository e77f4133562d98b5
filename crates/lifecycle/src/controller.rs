//! Order lifecycle orchestration.

use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{Erid, NewOrder, Order, OrderPhoto, OrderStatus, PhotoUpload, format_post_body};
use order_store::{
    MediaStore, OrderFilter, OrderPatch, OrderStore, OrderStoreExt, OrderWithPhotos, PurgeReport,
};

use crate::error::{LifecycleError, Result};
use crate::publisher::MediaPublisher;
use crate::resolver::ErdResolver;
use crate::services::compliance::ComplianceAuthority;
use crate::services::media_host::MediaHost;
use crate::services::payment::{PaymentGateway, PaymentInitiation};

/// A freshly created order and how to pay for it.
#[derive(Debug, Clone)]
pub struct CreatedOrder {
    pub order: Order,
    pub photos: Vec<OrderPhoto>,
    pub payment: PaymentInitiation,
}

/// Result of a successful publish.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub post_id: i64,
    pub erid: Erid,

    /// The order after the move to `published`.
    pub order: Order,
}

/// Drives an order from intake through publication.
///
/// The controller owns no state of its own; every transition is persisted
/// through the order store, and status changes go through its
/// compare-and-set operation so concurrent callers cannot both win.
pub struct OrderLifecycleController<S, M, A, H, P>
where
    S: OrderStore,
    M: MediaStore,
    A: ComplianceAuthority,
    H: MediaHost,
    P: PaymentGateway,
{
    store: S,
    media: M,
    resolver: ErdResolver<A>,
    publisher: MediaPublisher<H>,
    payments: P,
}

impl<S, M, A, H, P> OrderLifecycleController<S, M, A, H, P>
where
    S: OrderStore,
    M: MediaStore,
    A: ComplianceAuthority,
    H: MediaHost,
    P: PaymentGateway,
{
    pub fn new(
        store: S,
        media: M,
        resolver: ErdResolver<A>,
        publisher: MediaPublisher<H>,
        payments: P,
    ) -> Self {
        Self {
            store,
            media,
            resolver,
            publisher,
            payments,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    /// Validates intake data, persists a `pending` order with its photos and
    /// returns the payment-initiation payload.
    #[tracing::instrument(skip(self, new), fields(group_id = new.group_id, photos = new.photos.len()))]
    pub async fn create_order(&self, new: NewOrder) -> Result<CreatedOrder> {
        let order = Order::pending(&new)?;
        self.store.insert_order(&order).await?;

        let mut photos = Vec::with_capacity(new.photos.len());
        for upload in &new.photos {
            let storage_locator = self
                .media
                .put(&order.id, &upload.filename, &upload.bytes)
                .await?;
            let photo = OrderPhoto {
                order_id: order.id.clone(),
                filename: upload.filename.clone(),
                mimetype: upload.mimetype.clone(),
                storage_locator,
            };
            self.store.insert_photo(&photo).await?;
            photos.push(photo);
        }

        let payment = self.payments.initiate(&order);

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %order.id, price = %order.price, "order created");

        Ok(CreatedOrder {
            order,
            photos,
            payment,
        })
    }

    /// Moves a `pending` order to `paid`.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_payment(
        &self,
        order_id: &OrderId,
        payment_id: Option<String>,
    ) -> Result<Order> {
        let order = self.load(order_id).await?;
        if !order.status.can_confirm_payment() {
            return Err(LifecycleError::AlreadyPaid(order_id.clone()));
        }

        let patch = OrderPatch::new()
            .status(OrderStatus::Paid)
            .payment_id(payment_id)
            .paid_at(Utc::now());

        // Another confirmation got there first
        let paid = self
            .store
            .transition_status(order_id, OrderStatus::Pending, patch)
            .await?
            .ok_or_else(|| LifecycleError::AlreadyPaid(order_id.clone()))?;

        metrics::counter!("payments_confirmed_total").increment(1);
        tracing::info!(payment_id = ?paid.payment_id, "payment confirmed");
        Ok(paid)
    }

    /// Resolves the ERID, publishes the post and moves a `paid` order to
    /// `published`.
    ///
    /// Safe to call again after a `PublishFailed`: the stored ERID is reused
    /// and payment is never touched.
    #[tracing::instrument(skip(self))]
    pub async fn publish(&self, order_id: &OrderId) -> Result<PublishOutcome> {
        let OrderWithPhotos { order, photos } = self
            .store
            .get_order_with_photos(order_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(order_id.clone()))?;

        if !order.status.can_publish() {
            return Err(LifecycleError::InvalidState {
                order_id: order_id.clone(),
                status: order.status,
                required: OrderStatus::Paid,
            });
        }

        let start = std::time::Instant::now();
        let erid = self.ensure_erid(&order).await?;
        let body = format_post_body(&order.text, &erid);
        let images = self.load_images(&photos).await;

        let post = match self
            .publisher
            .upload_and_publish(&body, order.group_id, &images)
            .await
        {
            Ok(post) => post,
            Err(e) => {
                let reason = e.to_string();
                self.store
                    .update_order_fields(order_id, OrderPatch::new().last_error(reason.clone()))
                    .await?;
                metrics::counter!("publish_failures_total").increment(1);
                tracing::error!(error = %reason, "publish failed, order stays paid");
                return Err(LifecycleError::PublishFailed(reason));
            }
        };

        let patch = OrderPatch::new()
            .status(OrderStatus::Published)
            .post_id(post.post_id)
            .published_at(Utc::now());

        let Some(published) = self
            .store
            .transition_status(order_id, OrderStatus::Paid, patch)
            .await?
        else {
            let status = self
                .store
                .get_order(order_id)
                .await?
                .map_or(OrderStatus::Published, |o| o.status);
            tracing::error!(
                post_id = post.post_id,
                %status,
                "post created but order moved concurrently"
            );
            return Err(LifecycleError::InvalidState {
                order_id: order_id.clone(),
                status,
                required: OrderStatus::Paid,
            });
        };

        metrics::counter!("posts_published_total").increment(1);
        metrics::histogram!("publish_duration_seconds").record(start.elapsed().as_secs_f64());
        tracing::info!(post_id = post.post_id, %erid, "order published");

        Ok(PublishOutcome {
            post_id: post.post_id,
            erid,
            order: published,
        })
    }

    /// Confirms payment and publishes in one call.
    pub async fn confirm_and_publish(
        &self,
        order_id: &OrderId,
        payment_id: Option<String>,
    ) -> Result<PublishOutcome> {
        self.confirm_payment(order_id, payment_id).await?;
        self.publish(order_id).await
    }

    /// Loads an order with its photos.
    pub async fn get_order(&self, order_id: &OrderId) -> Result<OrderWithPhotos> {
        self.store
            .get_order_with_photos(order_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(order_id.clone()))
    }

    /// Lists orders matching `filter`, newest first.
    pub async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>> {
        Ok(self.store.list_orders(filter).await?)
    }

    /// Deletes orders created before `cutoff` and their photo blobs.
    #[tracing::instrument(skip(self))]
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<PurgeReport> {
        let report = self.store.delete_older_than(cutoff).await?;

        for locator in &report.photo_locators {
            if let Err(e) = self.media.remove(locator).await {
                tracing::warn!(%locator, error = %e, "failed to remove photo blob");
            }
        }

        metrics::counter!("orders_purged_total").increment(report.orders_deleted);
        if report.orders_deleted > 0 {
            tracing::info!(
                orders = report.orders_deleted,
                photos = report.photo_locators.len(),
                "expired orders purged"
            );
        }
        Ok(report)
    }

    async fn load(&self, order_id: &OrderId) -> Result<Order> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(order_id.clone()))
    }

    /// Returns the stored ERID, resolving and persisting one if needed.
    async fn ensure_erid(&self, order: &Order) -> Result<Erid> {
        if let Some(erid) = &order.erid {
            tracing::debug!(%erid, "reusing stored identifier");
            return Ok(erid.clone());
        }

        let resolved = self.resolver.resolve(order).await.into_erid();
        // A concurrent publish may have stored one first; keep that one
        self.store
            .set_erid_once(&order.id, &resolved)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(order.id.clone()))
    }

    /// Reads photo bytes back from media storage, skipping unreadable ones.
    async fn load_images(&self, photos: &[OrderPhoto]) -> Vec<PhotoUpload> {
        let mut images = Vec::with_capacity(photos.len());
        for photo in photos {
            match self.media.get(&photo.storage_locator).await {
                Ok(bytes) => images.push(PhotoUpload::new(
                    photo.filename.clone(),
                    photo.mimetype.clone(),
                    bytes,
                )),
                Err(e) => {
                    metrics::counter!("media_uploads_total", "outcome" => "unreadable")
                        .increment(1);
                    tracing::warn!(
                        locator = %photo.storage_locator,
                        error = %e,
                        "photo unreadable, skipping"
                    );
                }
            }
        }
        images
    }
}
