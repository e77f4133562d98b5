//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use lifecycle::{InMemoryComplianceAuthority, InMemoryMediaHost, RedirectGateway};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::{InMemoryMediaStore, InMemoryOrderStore, OrderFilter};
use serde_json::{Value, json};
use tower::ServiceExt;

use api::config::Config;
use api::{AppState, Services};

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const BOUNDARY: &str = "----order-form-boundary";

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

/// In-memory collaborators kept around so tests can steer them.
struct TestContext {
    app: axum::Router,
    state: Arc<AppState>,
    authority: InMemoryComplianceAuthority,
    host: InMemoryMediaHost,
}

fn setup() -> TestContext {
    setup_with(Arc::new(lifecycle::VkPayGateway))
}

fn setup_with(payments: api::DynPaymentGateway) -> TestContext {
    let authority = InMemoryComplianceAuthority::new();
    let host = InMemoryMediaHost::new();
    let services = Services {
        store: Arc::new(InMemoryOrderStore::new()),
        media: Arc::new(InMemoryMediaStore::new()),
        authority: Arc::new(authority.clone()),
        host: Arc::new(host.clone()),
        payments,
    };
    let state = api::create_state(services, &Config::default());
    let app = api::create_app(state.clone(), get_metrics_handle());
    TestContext {
        app,
        state,
        authority,
        host,
    }
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File(filename, mimetype, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"photos\"; filename=\"{filename}\"\r\n\
                         Content-Type: {mimetype}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn create_order_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/create-order")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn create_order(ctx: &TestContext, parts: &[Part<'_>]) -> String {
    let response = ctx
        .app
        .clone()
        .oneshot(create_order_request(parts))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await["order_id"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_health_check() {
    let ctx = setup();

    let response = ctx.app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "paid-post-service");
    assert!(json["timestamp"].is_string());
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let ctx = setup();

    let response = ctx.app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_create_order_vk_pay() {
    let ctx = setup();

    let response = ctx
        .app
        .clone()
        .oneshot(create_order_request(&[
            Part::Text("text", "Buy now"),
            Part::Text("group_id", "42"),
            Part::Text("price", "150"),
            Part::File("cat.jpg", "image/jpeg", &[0xFF, 0xD8, 0xFF]),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert!(json["order_id"].as_str().unwrap().starts_with("order_"));
    assert_eq!(json["payment_type"], "vk_pay");
    assert_eq!(json["order"]["amount"], 15000);
    assert_eq!(json["order"]["item"], "Размещение поста в группе 42");
    assert!(json["payment_url"].is_null());

    let order_id = json["order_id"].as_str().unwrap();
    let order = ctx
        .app
        .oneshot(get_request(&format!("/api/order/{order_id}")))
        .await
        .unwrap();
    let order = json_body(order).await;
    assert_eq!(order["status"], "pending");
    assert_eq!(order["order_data"]["photos"][0]["filename"], "cat.jpg");
    assert_eq!(order["order_data"]["group_id"], 42);
}

#[tokio::test]
async fn test_create_order_external_payment() {
    let ctx = setup_with(Arc::new(RedirectGateway::new("https://shop.example")));

    let response = ctx
        .app
        .oneshot(create_order_request(&[
            Part::Text("text", "Buy now"),
            Part::Text("group_id", "42"),
        ]))
        .await
        .unwrap();

    let json = json_body(response).await;
    assert_eq!(json["payment_type"], "external");
    assert!(json["order"].is_null());
    let order_id = json["order_id"].as_str().unwrap();
    assert_eq!(
        json["payment_url"],
        format!("https://shop.example/payment/{order_id}")
    );
}

#[tokio::test]
async fn test_create_order_validation_errors() {
    let ctx = setup();

    let cases: Vec<Vec<Part<'_>>> = vec![
        vec![Part::Text("group_id", "42")],
        vec![Part::Text("text", "Buy now")],
        vec![Part::Text("text", "Buy now"), Part::Text("group_id", "club42")],
        vec![
            Part::Text("text", "Buy now"),
            Part::Text("group_id", "42"),
            Part::Text("custom_erid", "bad"),
        ],
        vec![
            Part::Text("text", "Buy now"),
            Part::Text("group_id", "42"),
            Part::File("notes.txt", "text/plain", b"hello"),
        ],
    ];

    for parts in cases {
        let response = ctx
            .app
            .clone()
            .oneshot(create_order_request(&parts))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert!(json["error"].is_string());
    }

    let orders = ctx
        .state
        .controller
        .list_orders(OrderFilter::new())
        .await
        .unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
async fn test_create_order_rejects_eleven_photos() {
    let ctx = setup();
    let names: Vec<String> = (0..11).map(|i| format!("{i}.jpg")).collect();
    let mut parts = vec![Part::Text("text", "Buy now"), Part::Text("group_id", "42")];
    parts.extend(
        names
            .iter()
            .map(|name| Part::File(name.as_str(), "image/jpeg", &[1, 2, 3])),
    );

    let response = ctx
        .app
        .oneshot(create_order_request(&parts))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_confirm_payment_publishes() {
    let ctx = setup();
    let order_id = create_order(
        &ctx,
        &[
            Part::Text("text", "Buy now"),
            Part::Text("group_id", "42"),
            Part::File("cat.jpg", "image/jpeg", &[0xFF, 0xD8]),
        ],
    )
    .await;

    let response = ctx
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/confirm-payment",
            json!({"order_id": order_id, "payment_id": "pay_1"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["erid"], "VK-ORD-000001");
    assert!(json["post_id"].is_i64());

    let posts = ctx.host.posts();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].message.starts_with("Реклама\nERID: VK-ORD-000001\n\nBuy now"));
    assert_eq!(posts[0].attachments.len(), 1);

    let order = ctx
        .app
        .oneshot(get_request(&format!("/api/order/{order_id}")))
        .await
        .unwrap();
    let order = json_body(order).await;
    assert_eq!(order["status"], "published");
    assert_eq!(order["order_data"]["payment_id"], "pay_1");
}

#[tokio::test]
async fn test_confirm_payment_twice_conflicts() {
    let ctx = setup();
    let order_id = create_order(
        &ctx,
        &[Part::Text("text", "Buy now"), Part::Text("group_id", "42")],
    )
    .await;
    let request = || json_request("POST", "/api/confirm-payment", json!({"order_id": order_id}));

    let first = ctx.app.clone().oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = ctx.app.oneshot(request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_confirm_payment_errors() {
    let ctx = setup();

    let missing_id = ctx
        .app
        .clone()
        .oneshot(json_request("POST", "/api/confirm-payment", json!({})))
        .await
        .unwrap();
    assert_eq!(missing_id.status(), StatusCode::BAD_REQUEST);

    let unknown = ctx
        .app
        .oneshot(json_request(
            "POST",
            "/api/confirm-payment",
            json!({"order_id": "order_missing"}),
        ))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_publish_failure_then_retry() {
    let ctx = setup();
    ctx.authority.set_unreachable();
    ctx.host.set_fail_publish(true);
    let order_id = create_order(
        &ctx,
        &[Part::Text("text", "Buy now"), Part::Text("group_id", "42")],
    )
    .await;

    let failed = ctx
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/confirm-payment",
            json!({"order_id": order_id}),
        ))
        .await
        .unwrap();
    assert_eq!(failed.status(), StatusCode::BAD_GATEWAY);

    let order = ctx
        .app
        .clone()
        .oneshot(get_request(&format!("/api/order/{order_id}")))
        .await
        .unwrap();
    let order = json_body(order).await;
    assert_eq!(order["status"], "paid");
    assert!(order["order_data"]["last_error"].is_string());
    let erid = order["order_data"]["erid"].as_str().unwrap().to_string();
    assert!(erid.starts_with("ERID-"));

    ctx.host.set_fail_publish(false);
    let retried = ctx
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/orders/{order_id}/publish"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(retried.status(), StatusCode::OK);
    let json = json_body(retried).await;
    assert_eq!(json["erid"], erid);
}

#[tokio::test]
async fn test_publish_pending_order_conflicts() {
    let ctx = setup();
    let order_id = create_order(
        &ctx,
        &[Part::Text("text", "Buy now"), Part::Text("group_id", "42")],
    )
    .await;

    let response = ctx
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/orders/{order_id}/publish"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(ctx.host.call_count(), 0);
    assert_eq!(ctx.authority.register_count(), 0);
}

#[tokio::test]
async fn test_get_order_not_found() {
    let ctx = setup();

    let response = ctx
        .app
        .oneshot(get_request("/api/order/order_missing"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_orders_with_filters() {
    let ctx = setup();
    let first = create_order(
        &ctx,
        &[Part::Text("text", "first"), Part::Text("group_id", "1")],
    )
    .await;
    create_order(
        &ctx,
        &[Part::Text("text", "second"), Part::Text("group_id", "2")],
    )
    .await;
    ctx.app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/confirm-payment",
            json!({"order_id": first}),
        ))
        .await
        .unwrap();

    let all = json_body(ctx.app.clone().oneshot(get_request("/api/orders")).await.unwrap()).await;
    assert_eq!(all["count"], 2);

    let published = json_body(
        ctx.app
            .clone()
            .oneshot(get_request("/api/orders?status=published"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(published["count"], 1);
    assert_eq!(published["orders"][0]["id"], first);

    let group = json_body(
        ctx.app
            .clone()
            .oneshot(get_request("/api/orders?group_id=2&limit=5"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(group["count"], 1);
    assert_eq!(group["orders"][0]["text"], "second");

    let bad_status = ctx
        .app
        .oneshot(get_request("/api/orders?status=shipped"))
        .await
        .unwrap();
    assert_eq!(bad_status.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_payment_succeeded_publishes() {
    let ctx = setup();
    let order_id = create_order(
        &ctx,
        &[
            Part::Text("text", "Buy now"),
            Part::Text("group_id", "42"),
            Part::Text("custom_erid", "MYCODE-0001"),
        ],
    )
    .await;

    let response = ctx
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/webhook/payment",
            json!({
                "event": "payment.succeeded",
                "object": {"id": "yk_1", "metadata": {"order_id": order_id}}
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["received"], true);
    assert_eq!(ctx.authority.register_count(), 0);
    assert!(ctx.host.posts()[0].message.contains("ERID: MYCODE-0001"));

    // Redelivery is acknowledged without a second post
    let again = ctx
        .app
        .oneshot(json_request(
            "POST",
            "/api/webhook/payment",
            json!({
                "event": "payment.succeeded",
                "object": {"id": "yk_1", "metadata": {"order_id": order_id}}
            }),
        ))
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::OK);
    assert_eq!(ctx.host.posts().len(), 1);
}

#[tokio::test]
async fn test_webhook_other_events_are_acknowledged() {
    let ctx = setup();

    let response = ctx
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/webhook/payment",
            json!({"event": "payment.canceled"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["received"], true);

    let missing_order = ctx
        .app
        .oneshot(json_request(
            "POST",
            "/api/webhook/payment",
            json!({"event": "payment.succeeded", "object": {"id": "yk_1"}}),
        ))
        .await
        .unwrap();
    assert_eq!(missing_order.status(), StatusCode::BAD_REQUEST);
}
