//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p order-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::OrderId;
use domain::{Erid, NewOrder, Order, OrderPhoto, OrderStatus, Price};
use order_store::{
    OrderFilter, OrderPatch, OrderStore, OrderStoreExt, PostgresOrderStore, StoreError,
};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Schema creation is idempotent, run it once up front
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresOrderStore::new(temp_pool.clone())
                .initialize()
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresOrderStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE orders CASCADE")
        .execute(&pool)
        .await
        .unwrap();

    PostgresOrderStore::new(pool)
}

fn create_test_order(text: &str, group_id: i64) -> Order {
    Order::pending(
        &NewOrder::new(text, group_id)
            .with_user(7)
            .with_price("150.50".parse::<Price>().unwrap()),
    )
    .unwrap()
}

fn create_test_photo(order: &Order, locator: &str) -> OrderPhoto {
    OrderPhoto {
        order_id: order.id.clone(),
        filename: format!("{locator}.jpg"),
        mimetype: "image/jpeg".to_string(),
        storage_locator: locator.to_string(),
    }
}

#[tokio::test]
async fn insert_and_load_order_with_photos() {
    let store = get_test_store().await;
    let order = create_test_order("Buy now", 42);

    store.insert_order(&order).await.unwrap();
    store
        .insert_photo(&create_test_photo(&order, "first"))
        .await
        .unwrap();
    store
        .insert_photo(&create_test_photo(&order, "second"))
        .await
        .unwrap();

    let loaded = store
        .get_order_with_photos(&order.id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(loaded.order.id, order.id);
    assert_eq!(loaded.order.text, "Buy now");
    assert_eq!(loaded.order.price, order.price);
    assert_eq!(loaded.order.status, OrderStatus::Pending);
    assert_eq!(loaded.order.user_id, Some(7));
    assert_eq!(loaded.photos.len(), 2);
    assert_eq!(loaded.photos[0].storage_locator, "first");
    assert_eq!(loaded.photos[1].storage_locator, "second");
}

#[tokio::test]
async fn missing_order_returns_none() {
    let store = get_test_store().await;
    let loaded = store
        .get_order_with_photos(&OrderId::new("order_missing"))
        .await
        .unwrap();
    assert!(loaded.is_none());
}

#[tokio::test]
async fn duplicate_order_is_rejected() {
    let store = get_test_store().await;
    let order = create_test_order("Buy now", 42);

    store.insert_order(&order).await.unwrap();
    let result = store.insert_order(&order).await;
    assert!(matches!(result, Err(StoreError::DuplicateOrder(_))));
}

#[tokio::test]
async fn photo_for_missing_order_is_rejected() {
    let store = get_test_store().await;
    let order = create_test_order("never inserted", 42);

    let result = store
        .insert_photo(&create_test_photo(&order, "orphan"))
        .await;
    assert!(matches!(result, Err(StoreError::OrderNotFound(_))));
}

#[tokio::test]
async fn update_writes_only_set_fields() {
    let store = get_test_store().await;
    let order = create_test_order("Buy now", 42);
    store.insert_order(&order).await.unwrap();

    store
        .update_order_fields(
            &order.id,
            OrderPatch::new().payment_id(Some("pay_1".to_string())),
        )
        .await
        .unwrap();
    let updated = store
        .update_order_fields(
            &order.id,
            OrderPatch::new().erid(Erid::parse("MYCODE-0001").unwrap()),
        )
        .await
        .unwrap();
    assert!(updated);

    let loaded = store.get_order(&order.id).await.unwrap().unwrap();
    assert_eq!(loaded.payment_id.as_deref(), Some("pay_1"));
    assert_eq!(loaded.erid.unwrap().as_str(), "MYCODE-0001");
    assert!(loaded.post_id.is_none());
}

#[tokio::test]
async fn update_cannot_move_status_or_replace_erid() {
    let store = get_test_store().await;
    let order = create_test_order("Buy now", 42);
    store.insert_order(&order).await.unwrap();

    let first = Erid::parse("FIRST-0001").unwrap();
    store
        .transition_status(
            &order.id,
            OrderStatus::Pending,
            OrderPatch::new().status(OrderStatus::Paid).erid(first.clone()),
        )
        .await
        .unwrap()
        .unwrap();

    let result = store
        .update_order_fields(
            &order.id,
            OrderPatch::new()
                .status(OrderStatus::Pending)
                .erid(Erid::parse("SECOND-0002").unwrap()),
        )
        .await;
    assert!(matches!(
        result,
        Err(StoreError::StatusUpdate(OrderStatus::Pending))
    ));

    let updated = store
        .update_order_fields(
            &order.id,
            OrderPatch::new().erid(Erid::parse("SECOND-0002").unwrap()),
        )
        .await
        .unwrap();
    assert!(updated);

    let loaded = store.get_order(&order.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, OrderStatus::Paid);
    assert_eq!(loaded.erid, Some(first));
}

#[tokio::test]
async fn empty_patch_is_a_no_op() {
    let store = get_test_store().await;
    let order = create_test_order("Buy now", 42);
    store.insert_order(&order).await.unwrap();

    let updated = store
        .update_order_fields(&order.id, OrderPatch::new())
        .await
        .unwrap();
    assert!(!updated);
}

#[tokio::test]
async fn erid_is_written_once() {
    let store = get_test_store().await;
    let order = create_test_order("Buy now", 42);
    store.insert_order(&order).await.unwrap();

    let first = Erid::parse("FIRST-0001").unwrap();
    let second = Erid::parse("SECOND-0002").unwrap();

    let stored = store.set_erid_once(&order.id, &first).await.unwrap();
    assert_eq!(stored, Some(first.clone()));

    let stored = store.set_erid_once(&order.id, &second).await.unwrap();
    assert_eq!(stored, Some(first));

    let missing = store
        .set_erid_once(&OrderId::new("order_missing"), &second)
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn transition_is_compare_and_set() {
    let store = get_test_store().await;
    let order = create_test_order("Buy now", 42);
    store.insert_order(&order).await.unwrap();

    let paid_at = Utc::now();
    let patch = OrderPatch::new()
        .status(OrderStatus::Paid)
        .payment_id(Some("pay_1".to_string()))
        .paid_at(paid_at);

    let first = store
        .transition_status(&order.id, OrderStatus::Pending, patch.clone())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.status, OrderStatus::Paid);
    assert_eq!(first.payment_id.as_deref(), Some("pay_1"));
    assert!(first.paid_at.is_some());

    let second = store
        .transition_status(&order.id, OrderStatus::Pending, patch)
        .await
        .unwrap();
    assert!(second.is_none());
}

#[tokio::test]
async fn concurrent_transitions_have_a_single_winner() {
    let store = get_test_store().await;
    let order = create_test_order("Buy now", 42);
    store.insert_order(&order).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..5 {
        let store = store.clone();
        let id = order.id.clone();
        handles.push(tokio::spawn(async move {
            store
                .transition_status(
                    &id,
                    OrderStatus::Pending,
                    OrderPatch::new()
                        .status(OrderStatus::Paid)
                        .payment_id(Some(format!("pay_{i}"))),
                )
                .await
                .unwrap()
                .is_some()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn list_orders_applies_filters() {
    let store = get_test_store().await;
    let first = create_test_order("first", 1);
    let second = create_test_order("second", 1);
    let other = create_test_order("other", 2);

    for order in [&first, &second, &other] {
        store.insert_order(order).await.unwrap();
    }
    store
        .transition_status(
            &second.id,
            OrderStatus::Pending,
            OrderPatch::new().status(OrderStatus::Paid),
        )
        .await
        .unwrap();

    let group_one = store
        .list_orders(OrderFilter::new().group_id(1))
        .await
        .unwrap();
    assert_eq!(group_one.len(), 2);

    let paid = store
        .list_orders(OrderFilter::new().status(OrderStatus::Paid))
        .await
        .unwrap();
    assert_eq!(paid.len(), 1);
    assert_eq!(paid[0].id, second.id);

    let limited = store.list_orders(OrderFilter::new().limit(2)).await.unwrap();
    assert_eq!(limited.len(), 2);
}

#[tokio::test]
async fn delete_older_than_cascades_photos() {
    let store = get_test_store().await;
    let mut old = create_test_order("old", 1);
    old.created_at = Utc::now() - Duration::days(45);
    let fresh = create_test_order("fresh", 1);

    store.insert_order(&old).await.unwrap();
    store.insert_order(&fresh).await.unwrap();
    store
        .insert_photo(&create_test_photo(&old, "old-photo"))
        .await
        .unwrap();
    store
        .insert_photo(&create_test_photo(&fresh, "fresh-photo"))
        .await
        .unwrap();

    let report = store
        .delete_older_than(Utc::now() - Duration::days(30))
        .await
        .unwrap();

    assert_eq!(report.orders_deleted, 1);
    assert_eq!(report.photo_locators, vec!["old-photo".to_string()]);
    assert!(!store.order_exists(&old.id).await.unwrap());

    let remaining = store
        .get_order_with_photos(&fresh.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(remaining.photos.len(), 1);
}
