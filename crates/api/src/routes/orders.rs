//! Order intake, payment and publication endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use common::OrderId;
use domain::{MAX_PHOTOS, NewOrder, Order, OrderError, OrderStatus, PhotoUpload, Price};
use lifecycle::{LifecycleError, PublishOutcome, VkPayOrder};
use order_store::{OrderFilter, OrderWithPhotos};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

/// Orders returned by a listing when no limit is given.
pub const DEFAULT_LIST_LIMIT: u32 = 100;

/// Hard cap on a listing.
pub const MAX_LIST_LIMIT: u32 = 1000;

// -- Request types --

/// Text fields of the intake form, as received.
#[derive(Debug, Default)]
struct OrderForm {
    text: Option<String>,
    group_id: Option<String>,
    user_id: Option<String>,
    price: Option<String>,
    custom_erid: Option<String>,
    photos: Vec<PhotoUpload>,
}

impl OrderForm {
    fn set(&mut self, name: &str, value: String) {
        let slot = match name {
            "text" => &mut self.text,
            "group_id" => &mut self.group_id,
            "user_id" => &mut self.user_id,
            "price" => &mut self.price,
            "custom_erid" => &mut self.custom_erid,
            _ => {
                tracing::debug!(field = name, "ignoring unknown form field");
                return;
            }
        };
        *slot = Some(value);
    }

    fn into_new_order(self) -> Result<NewOrder, ApiError> {
        let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        // Missing group id is reported by domain validation
        let group_id = match non_blank(self.group_id) {
            Some(raw) => parse_integer("group_id", &raw)?,
            None => 0,
        };
        let user_id = non_blank(self.user_id)
            .map(|raw| parse_integer("user_id", &raw))
            .transpose()?;
        let price = match non_blank(self.price) {
            Some(raw) => raw.parse::<Price>().map_err(LifecycleError::from)?,
            None => Price::default(),
        };

        Ok(NewOrder {
            text: self.text.unwrap_or_default(),
            group_id,
            user_id,
            price,
            custom_erid: non_blank(self.custom_erid),
            photos: self.photos,
        })
    }
}

fn parse_integer(field: &str, raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("{field} must be an integer")))
}

#[derive(Deserialize)]
pub struct ConfirmPaymentRequest {
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
}

#[derive(Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<String>,
    pub group_id: Option<i64>,
    pub user_id: Option<i64>,
    pub limit: Option<u32>,
}

// -- Response types --

#[derive(Serialize)]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub payment_type: &'static str,
    pub order: Option<VkPayOrder>,
    pub payment_url: Option<String>,
}

#[derive(Serialize)]
pub struct PublishResponse {
    pub success: bool,
    pub post_id: i64,
    pub erid: String,
    pub message: &'static str,
}

impl From<PublishOutcome> for PublishResponse {
    fn from(outcome: PublishOutcome) -> Self {
        Self {
            success: true,
            post_id: outcome.post_id,
            erid: outcome.erid.to_string(),
            message: "Post published with ERID",
        }
    }
}

#[derive(Serialize)]
pub struct PhotoResponse {
    pub filename: String,
    pub mimetype: String,
}

#[derive(Serialize)]
pub struct OrderData {
    #[serde(flatten)]
    pub order: Order,
    pub photos: Vec<PhotoResponse>,
}

#[derive(Serialize)]
pub struct OrderStatusResponse {
    pub order_id: String,
    pub status: OrderStatus,
    pub order_data: OrderData,
}

impl From<OrderWithPhotos> for OrderStatusResponse {
    fn from(OrderWithPhotos { order, photos }: OrderWithPhotos) -> Self {
        Self {
            order_id: order.id.to_string(),
            status: order.status,
            order_data: OrderData {
                photos: photos
                    .into_iter()
                    .map(|p| PhotoResponse {
                        filename: p.filename,
                        mimetype: p.mimetype,
                    })
                    .collect(),
                order,
            },
        }
    }
}

#[derive(Serialize)]
pub struct ListOrdersResponse {
    pub orders: Vec<Order>,
    pub count: usize,
}

// -- Handlers --

/// POST /api/create-order: multipart intake of a new order.
#[tracing::instrument(skip(state, multipart))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<CreateOrderResponse>, ApiError> {
    let mut form = OrderForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "photos" {
            // Stop reading before buffering an eleventh file
            if form.photos.len() == MAX_PHOTOS {
                return Err(LifecycleError::from(OrderError::TooManyPhotos {
                    count: MAX_PHOTOS + 1,
                    max: MAX_PHOTOS,
                })
                .into());
            }
            let filename = field.file_name().unwrap_or("photo.jpg").to_string();
            let mimetype = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field.bytes().await?;
            form.photos
                .push(PhotoUpload::new(filename, mimetype, bytes.to_vec()));
        } else {
            let value = field.text().await?;
            form.set(&name, value);
        }
    }

    let created = state
        .controller
        .create_order(form.into_new_order()?)
        .await?;

    Ok(Json(CreateOrderResponse {
        order_id: created.order.id.to_string(),
        payment_type: created.payment.payment_type(),
        order: created.payment.vk_order().cloned(),
        payment_url: created.payment.payment_url().map(str::to_string),
    }))
}

/// POST /api/confirm-payment: confirm payment and publish the post.
#[tracing::instrument(skip(state, req))]
pub async fn confirm_payment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConfirmPaymentRequest>,
) -> Result<Json<PublishResponse>, ApiError> {
    let order_id = req
        .order_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("order_id is required".to_string()))?;

    let outcome = state
        .controller
        .confirm_and_publish(&OrderId::new(order_id), req.payment_id)
        .await?;

    Ok(Json(outcome.into()))
}

/// POST /api/orders/{id}/publish: retry publication of a paid order.
#[tracing::instrument(skip(state))]
pub async fn publish(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PublishResponse>, ApiError> {
    let outcome = state.controller.publish(&OrderId::new(id)).await?;
    Ok(Json(outcome.into()))
}

/// GET /api/order/{id}: order status with its data.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OrderStatusResponse>, ApiError> {
    let order = state.controller.get_order(&OrderId::new(id)).await?;
    Ok(Json(order.into()))
}

/// GET /api/orders: list orders, newest first.
#[tracing::instrument(skip(state, query))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<ListOrdersResponse>, ApiError> {
    let mut filter = OrderFilter::new().limit(
        query
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .min(MAX_LIST_LIMIT),
    );
    if let Some(status) = query.status {
        let status = status
            .parse::<OrderStatus>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        filter = filter.status(status);
    }
    if let Some(group_id) = query.group_id {
        filter = filter.group_id(group_id);
    }
    if let Some(user_id) = query.user_id {
        filter = filter.user_id(user_id);
    }

    let orders = state.controller.list_orders(filter).await?;
    Ok(Json(ListOrdersResponse {
        count: orders.len(),
        orders,
    }))
}
