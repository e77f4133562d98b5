//! HTTP API server with observability for the paid post order service.
//!
//! Provides endpoints for order intake, payment confirmation, publication
//! and status lookup, with structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod retention;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use domain::{MAX_PHOTO_BYTES, MAX_PHOTOS};
use lifecycle::{
    ComplianceAuthority, ErdResolver, InMemoryComplianceAuthority, InMemoryMediaHost, MediaHost,
    MediaPublisher, OrderLifecycleController, PaymentGateway, RedirectGateway, VkPayGateway,
};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::{InMemoryMediaStore, InMemoryOrderStore, MediaStore, OrderStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::{Config, PaymentType};

/// Room for text fields and multipart framing on top of the photos.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

pub type DynOrderStore = Arc<dyn OrderStore>;
pub type DynMediaStore = Arc<dyn MediaStore>;
pub type DynComplianceAuthority = Arc<dyn ComplianceAuthority>;
pub type DynMediaHost = Arc<dyn MediaHost>;
pub type DynPaymentGateway = Arc<dyn PaymentGateway>;

/// The controller as wired by the server.
pub type Controller = OrderLifecycleController<
    DynOrderStore,
    DynMediaStore,
    DynComplianceAuthority,
    DynMediaHost,
    DynPaymentGateway,
>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub controller: Controller,
}

/// External collaborators the controller is built from.
pub struct Services {
    pub store: DynOrderStore,
    pub media: DynMediaStore,
    pub authority: DynComplianceAuthority,
    pub host: DynMediaHost,
    pub payments: DynPaymentGateway,
}

impl Services {
    /// All in-memory collaborators, paying through VK Pay.
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(InMemoryOrderStore::new()),
            media: Arc::new(InMemoryMediaStore::new()),
            authority: Arc::new(InMemoryComplianceAuthority::new()),
            host: Arc::new(InMemoryMediaHost::new()),
            payments: Arc::new(VkPayGateway),
        }
    }
}

/// Picks the payment gateway for the configured payment type.
pub fn payment_gateway(config: &Config) -> DynPaymentGateway {
    match config.payment_type {
        PaymentType::VkPay => Arc::new(VkPayGateway),
        PaymentType::External => Arc::new(RedirectGateway::new(config.frontend_url.clone())),
    }
}

/// Creates the application state from services and timeouts in `config`.
pub fn create_state(services: Services, config: &Config) -> Arc<AppState> {
    let controller = OrderLifecycleController::new(
        services.store,
        services.media,
        ErdResolver::new(services.authority, config.ord_timeout),
        MediaPublisher::new(services.host, config.media_timeout),
        services.payments,
    );
    Arc::new(AppState { controller })
}

/// Creates the default application state with in-memory services.
pub fn create_default_state() -> Arc<AppState> {
    create_state(Services::in_memory(), &Config::default())
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/api/create-order",
            post(routes::orders::create)
                .layer(DefaultBodyLimit::max(MAX_PHOTOS * MAX_PHOTO_BYTES + FORM_OVERHEAD_BYTES)),
        )
        .route("/api/confirm-payment", post(routes::orders::confirm_payment))
        .route("/api/order/{id}", get(routes::orders::get))
        .route("/api/orders", get(routes::orders::list))
        .route("/api/orders/{id}/publish", post(routes::orders::publish))
        .route("/api/webhook/payment", post(routes::webhook::payment))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
