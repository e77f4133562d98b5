//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use api::{DynComplianceAuthority, DynMediaHost, DynOrderStore, Services};
use lifecycle::{
    InMemoryComplianceAuthority, InMemoryMediaHost, VkApi, VkOrdClient, VkWallClient,
};
use order_store::{FsMediaStore, InMemoryOrderStore, PostgresOrderStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let json = config.log_format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

async fn order_store(config: &Config) -> Result<DynOrderStore, BoxError> {
    match &config.database_url {
        Some(url) => Ok(Arc::new(PostgresOrderStore::connect(url).await?)),
        None => {
            tracing::warn!("DATABASE_URL not set, orders are kept in memory");
            Ok(Arc::new(InMemoryOrderStore::new()))
        }
    }
}

fn vk_services(config: &Config) -> Result<(DynComplianceAuthority, DynMediaHost), BoxError> {
    let authority: DynComplianceAuthority = match config.ord_token() {
        Some(token) => {
            let api = VkApi::new(config.vk_api_version.clone(), config.ord_timeout)?;
            Arc::new(VkOrdClient::new(api, token))
        }
        None => {
            tracing::warn!("no VK ORD token, ad registration uses an in-memory authority");
            Arc::new(InMemoryComplianceAuthority::new())
        }
    };

    let host: DynMediaHost = match &config.vk_access_token {
        Some(token) => {
            let api = VkApi::new(config.vk_api_version.clone(), config.media_timeout)?;
            Arc::new(VkWallClient::new(api, token.clone()))
        }
        None => {
            tracing::warn!("VK_ACCESS_TOKEN not set, posts go to an in-memory wall");
            Arc::new(InMemoryMediaHost::new())
        }
    };

    Ok((authority, host))
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Initialize storage and external services
    let store = order_store(&config).await?;
    let media = Arc::new(FsMediaStore::init(&config.media_dir).await?);
    let (authority, host) = vk_services(&config)?;

    let state = api::create_state(
        Services {
            store,
            media,
            authority,
            host,
            payments: api::payment_gateway(&config),
        },
        &config,
    );

    // 4. Start the retention task
    let retention = api::retention::spawn(
        state.clone(),
        config.retention_days,
        config.retention_interval,
    );

    // 5. Build the application and start the server
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    retention.abort();
    tracing::info!("server shut down gracefully");
    Ok(())
}
