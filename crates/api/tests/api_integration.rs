//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::AppState;
use api::state::{demo_customers, demo_inventory};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::GatewayPaymentId;
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::InMemoryOrderStore;
use saga::{
    GatewayError, InMemoryInventoryService, InMemoryPaymentGateway, PaymentSettings,
};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

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

struct TestApp {
    router: axum::Router,
    store: InMemoryOrderStore,
    inventory: InMemoryInventoryService,
    gateway: InMemoryPaymentGateway,
}

fn setup() -> TestApp {
    let store = InMemoryOrderStore::new();
    let inventory = demo_inventory();
    let gateway = InMemoryPaymentGateway::new();
    let state = Arc::new(AppState::new(
        Arc::new(store.clone()),
        Arc::new(demo_customers()),
        Arc::new(inventory.clone()),
        Arc::new(gateway.clone()),
        PaymentSettings::default(),
    ));

    TestApp {
        router: api::create_app(state, get_metrics_handle()),
        store,
        inventory,
        gateway,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn post(&self, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn put(&self, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        self.send(
            Request::builder()
                .method("PUT")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn create_order(&self, customer_id: &str, vehicle_id: &str) -> String {
        let (status, json) = self
            .post(
                "/orders",
                serde_json::json!({ "customer_id": customer_id, "vehicle_id": vehicle_id }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let (status, json) = app.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_create_and_get_order() {
    let app = setup();

    let order_id = app.create_order("cust-1", "veh-1").await;
    let (status, json) = app.get(&format!("/orders/{order_id}")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "Reserved");
    assert_eq!(json["payment_status"], "Pending");
    assert_eq!(json["customer_id"], "cust-1");
    assert_eq!(json["vehicle"]["vehicle_id"], "veh-1");
    assert_eq!(json["total_cents"], 5_000_000);
    assert_eq!(json["status_history"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_create_order_errors() {
    let app = setup();

    let (status, _) = app
        .post(
            "/orders",
            serde_json::json!({ "customer_id": "nobody", "vehicle_id": "veh-1" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post(
            "/orders",
            serde_json::json!({ "customer_id": "cust-1", "vehicle_id": "" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.create_order("cust-1", "veh-1").await;
    let (status, json) = app
        .post(
            "/orders",
            serde_json::json!({ "customer_id": "cust-2", "vehicle_id": "veh-1" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("veh-1"));
}

#[tokio::test]
async fn test_get_nonexistent_order() {
    let app = setup();
    let fake_id = common::OrderId::new();

    let (status, _) = app.get(&format!("/orders/{fake_id}")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_order_id_format() {
    let app = setup();

    let (status, _) = app.get("/orders/not-a-uuid").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_endpoints() {
    let app = setup();

    let (status, json) = app.get("/orders").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!([]));

    let first = app.create_order("cust-1", "veh-1").await;
    app.create_order("cust-2", "veh-2").await;
    let (status, _) = app
        .put(
            &format!("/orders/{first}/status"),
            serde_json::json!({ "status": "Cancelled" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, all) = app.get("/orders").await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (_, active) = app.get("/orders/active").await;
    assert_eq!(active.as_array().unwrap().len(), 1);

    let (_, cancelled) = app.get("/orders/status/Cancelled").await;
    assert_eq!(cancelled.as_array().unwrap().len(), 1);
    assert_eq!(cancelled[0]["id"], first);

    let (_, by_customer) = app.get("/orders/customer/cust-2").await;
    assert_eq!(by_customer.as_array().unwrap().len(), 1);

    let (status, _) = app.get("/orders/status/Shipped").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_status_rules() {
    let app = setup();
    let order_id = app.create_order("cust-1", "veh-1").await;

    let (status, _) = app
        .put(
            &format!("/orders/{order_id}/status"),
            serde_json::json!({ "status": "Reserved" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .put(
            &format!("/orders/{order_id}/status"),
            serde_json::json!({ "status": "Completed" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(app.inventory.remove_count(), 0);
}

#[tokio::test]
async fn test_payment_flow_through_webhook() {
    let app = setup();
    let order_id = app.create_order("cust-1", "veh-1").await;

    let (status, payment) = app
        .post(&format!("/payments/{order_id}"), serde_json::json!({}))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{payment}");
    assert_eq!(payment["status"], "Processing");
    assert_eq!(payment["method"], "PIX");
    assert!(!payment["qr_code_link"].as_str().unwrap().is_empty());

    let (status, _) = app
        .post(
            "/webhooks/pagseguro",
            serde_json::json!({
                "event": "transaction",
                "data": { "reference_id": order_id, "status": "PAID" },
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, order) = app.get(&format!("/orders/{order_id}")).await;
    assert_eq!(order["status"], "Completed");
    assert_eq!(order["payment_status"], "Approved");
    assert_eq!(app.inventory.remove_count(), 1);
}

#[tokio::test]
async fn test_webhook_always_acknowledges() {
    let app = setup();

    let (status, _) = app
        .post(
            "/webhooks/pagseguro",
            serde_json::json!({
                "event": "transaction",
                "data": { "reference_id": common::OrderId::new().to_string(), "status": "PAID" },
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/webhooks/pagseguro")
                .header("content-type", "application/json")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.store.order_count().await, 0);
}

#[tokio::test]
async fn test_simulation_declines_payment() {
    let app = setup();
    let order_id = app.create_order("cust-1", "veh-1").await;

    let (status, _) = app
        .post(&format!("/webhooks/simulation/{order_id}/Declined"), serde_json::json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.post(&format!("/payments/{order_id}"), serde_json::json!({}))
        .await;
    let (status, order) = app
        .post(&format!("/webhooks/simulation/{order_id}/Declined"), serde_json::json!({}))
        .await;

    assert_eq!(status, StatusCode::OK, "{order}");
    assert_eq!(order["status"], "Cancelled");
    assert_eq!(order["payment_status"], "Declined");
    assert_eq!(app.inventory.release_count(), 1);

    let (status, _) = app
        .post(&format!("/webhooks/simulation/{order_id}/Pending"), serde_json::json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_payment_status_refresh() {
    let app = setup();
    let order_id = app.create_order("cust-1", "veh-1").await;
    let (_, payment) = app
        .post(&format!("/payments/{order_id}"), serde_json::json!({}))
        .await;
    let payment_id = GatewayPaymentId::new(payment["payment_id"].as_str().unwrap());
    app.gateway.set_external_status(&payment_id, "PAID");

    let (status, json) = app.get(&format!("/payments/{order_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["order"]["status"], "PaymentProcessing");

    let (status, json) = app.get(&format!("/payments/{order_id}?refresh=true")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["order"]["status"], "Completed");
    assert_eq!(json["payment"]["status"], "Approved");
}

#[tokio::test]
async fn test_gateway_client_error_maps_to_422() {
    let app = setup();
    let order_id = app.create_order("cust-1", "veh-1").await;
    app.gateway
        .set_fail_on_create(Some(GatewayError::new(Some(400), "invalid tax_id")));

    let (status, json) = app
        .post(&format!("/payments/{order_id}"), serde_json::json!({}))
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["gateway_status"], 400);

    app.gateway
        .set_fail_on_create(Some(GatewayError::new(Some(503), "unavailable")));
    let (status, _) = app
        .post(&format!("/payments/{order_id}"), serde_json::json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_compensations_endpoint() {
    let app = setup();
    app.store.set_fail_on_create(true);
    app.inventory.set_fail_on_release(true);

    let (status, _) = app
        .post(
            "/orders",
            serde_json::json!({ "customer_id": "cust-1", "vehicle_id": "veh-1" }),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, json) = app.get("/admin/compensations").await;
    assert_eq!(status, StatusCode::OK);
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["kind"], "ReleaseReservation");
    assert_eq!(entries[0]["vehicle_id"], "veh-1");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    app.create_order("cust-1", "veh-1").await;

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("saga_executions_total"));
}

#[tokio::test]
async fn test_every_saga_operation_is_timed_and_failures_counted() {
    let app = setup();
    let order_id = app.create_order("cust-1", "veh-1").await;

    let (status, _) = app
        .put(
            &format!("/orders/{order_id}/status"),
            serde_json::json!({ "status": "Completed" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = app
        .put(
            &format!("/orders/{order_id}/status"),
            serde_json::json!({ "status": "Cancelled" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .put(
            &format!("/orders/{order_id}/status"),
            serde_json::json!({ "status": "Cancelled" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for operation in ["create_order", "finalize_order", "cancel_order"] {
        assert!(
            text.contains(&format!("saga_duration_seconds_count{{operation=\"{operation}\"}}")),
            "no duration recorded for {operation}"
        );
    }
    assert!(text.contains("saga_failed{operation=\"finalize_order\"}"));
    assert!(text.contains("saga_failed{operation=\"cancel_order\"}"));
}
