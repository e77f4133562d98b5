//! Payment provider webhook.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use common::OrderId;
use lifecycle::LifecycleError;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

/// Event that confirms a payment.
pub const PAYMENT_SUCCEEDED: &str = "payment.succeeded";

#[derive(Debug, Deserialize)]
pub struct PaymentEvent {
    pub event: String,
    #[serde(default)]
    pub object: PaymentObject,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentObject {
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: PaymentMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentMetadata {
    pub order_id: Option<String>,
}

#[derive(Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// POST /api/webhook/payment: provider notification.
///
/// `payment.succeeded` confirms and publishes the referenced order. Every
/// other event is acknowledged and ignored. Outcomes a redelivery cannot
/// change (duplicate, unknown order, failed post) are acknowledged too so
/// the provider stops retrying; only infrastructure failures are returned.
#[tracing::instrument(skip(state, payload), fields(event = %payload.event))]
pub async fn payment(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PaymentEvent>,
) -> Result<Json<WebhookAck>, ApiError> {
    metrics::counter!("payment_webhooks_total", "event" => payload.event.clone()).increment(1);

    if payload.event != PAYMENT_SUCCEEDED {
        tracing::debug!("ignoring payment event");
        return Ok(Json(WebhookAck { received: true }));
    }

    let order_id = payload
        .object
        .metadata
        .order_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("object.metadata.order_id is required".to_string()))?;

    match state
        .controller
        .confirm_and_publish(&OrderId::new(order_id), payload.object.id)
        .await
    {
        Ok(outcome) => {
            tracing::info!(post_id = outcome.post_id, "order published from webhook");
        }
        Err(e @ LifecycleError::Store(_)) => return Err(e.into()),
        Err(e) => {
            tracing::warn!(error = %e, "webhook payment not applied");
        }
    }

    Ok(Json(WebhookAck { received: true }))
}
