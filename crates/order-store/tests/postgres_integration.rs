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
use common::{CustomerId, GatewayPaymentId, OrderId, VehicleId};
use domain::{Money, Order, OrderError, OrderStatus, Payment, PaymentStatus, VehicleSnapshot};
use order_store::{OrderStore, PostgresOrderStore, StatusUpdate, StoreError};
use serial_test::serial;
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

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_orders_tables.sql"
            ))
            .execute(&temp_pool)
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

    sqlx::query("TRUNCATE TABLE payments, order_status_history, orders")
        .execute(&pool)
        .await
        .unwrap();

    PostgresOrderStore::new(pool)
}

fn vehicle(id: &str, price: i64) -> VehicleSnapshot {
    VehicleSnapshot {
        vehicle_id: VehicleId::new(id),
        make: "Honda".to_string(),
        model: "Civic".to_string(),
        year: 2021,
        price: Money::from_units(price),
        plate: "HND2C21".to_string(),
    }
}

fn reserved_order(customer: &str, offset_secs: i64) -> Order {
    // Postgres keeps microseconds; trim so round-tripped orders compare equal.
    let at = Utc::now() + Duration::seconds(offset_secs);
    let at = at - Duration::nanoseconds(i64::from(at.timestamp_subsec_nanos() % 1000));
    Order::reserved(CustomerId::new(customer), vehicle("veh-1", 50000), at)
}

#[tokio::test]
#[serial]
async fn create_and_load_order() {
    let store = get_test_store().await;
    let order = reserved_order("cust-1", 0);

    store.create(&order).await.unwrap();

    let loaded = store.get_by_id(order.id()).await.unwrap().unwrap();
    assert_eq!(loaded, order);
    assert_eq!(loaded.total(), Money::from_units(50000));
    assert_eq!(loaded.status_history().len(), 2);
}

#[tokio::test]
#[serial]
async fn missing_order_is_none() {
    let store = get_test_store().await;
    assert!(store.get_by_id(OrderId::new()).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn duplicate_create_is_rejected() {
    let store = get_test_store().await;
    let order = reserved_order("cust-1", 0);

    store.create(&order).await.unwrap();
    let result = store.create(&order).await;

    assert!(matches!(result, Err(StoreError::DuplicateOrder(id)) if id == order.id()));
}

#[tokio::test]
#[serial]
async fn status_update_appends_history() {
    let store = get_test_store().await;
    let order = reserved_order("cust-1", 0);
    store.create(&order).await.unwrap();

    store
        .update_status(
            order.id(),
            StatusUpdate::new(OrderStatus::Reserved, OrderStatus::PaymentProcessing),
        )
        .await
        .unwrap();
    let updated = store
        .update_status(
            order.id(),
            StatusUpdate::new(OrderStatus::PaymentProcessing, OrderStatus::PaymentApproved),
        )
        .await
        .unwrap();

    assert_eq!(updated.status(), OrderStatus::PaymentApproved);
    let statuses: Vec<_> = updated.status_history().iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![
            OrderStatus::Processing,
            OrderStatus::Reserved,
            OrderStatus::PaymentProcessing,
            OrderStatus::PaymentApproved,
        ]
    );
}

#[tokio::test]
#[serial]
async fn stale_status_update_conflicts() {
    let store = get_test_store().await;
    let order = reserved_order("cust-1", 0);
    store.create(&order).await.unwrap();

    store
        .update_status(
            order.id(),
            StatusUpdate::new(OrderStatus::Reserved, OrderStatus::Cancelled),
        )
        .await
        .unwrap();

    let result = store
        .update_status(
            order.id(),
            StatusUpdate::new(OrderStatus::Reserved, OrderStatus::PaymentProcessing),
        )
        .await;

    assert!(matches!(
        result,
        Err(StoreError::ConcurrencyConflict {
            actual: OrderStatus::Cancelled,
            ..
        })
    ));
    let stored = store.get_by_id(order.id()).await.unwrap().unwrap();
    assert_eq!(stored.status_history().len(), 3);
}

#[tokio::test]
#[serial]
async fn forbidden_transition_is_rejected() {
    let store = get_test_store().await;
    let order = reserved_order("cust-1", 0);
    store.create(&order).await.unwrap();

    let result = store
        .update_status(
            order.id(),
            StatusUpdate::new(OrderStatus::Reserved, OrderStatus::Completed),
        )
        .await;

    assert!(matches!(
        result,
        Err(StoreError::Domain(OrderError::InvalidTransition { .. }))
    ));
    let stored = store.get_by_id(order.id()).await.unwrap().unwrap();
    assert_eq!(stored.status(), OrderStatus::Reserved);
}

#[tokio::test]
#[serial]
async fn update_unknown_order() {
    let store = get_test_store().await;

    let result = store
        .update_status(
            OrderId::new(),
            StatusUpdate::new(OrderStatus::Reserved, OrderStatus::Cancelled),
        )
        .await;
    assert!(matches!(result, Err(StoreError::OrderNotFound(_))));

    let result = store
        .update_payment_id(OrderId::new(), &GatewayPaymentId::new("ORDE_X"))
        .await;
    assert!(matches!(result, Err(StoreError::OrderNotFound(_))));

    let result = store.claim_payment(OrderId::new()).await;
    assert!(matches!(result, Err(StoreError::OrderNotFound(_))));
}

#[tokio::test]
#[serial]
async fn list_queries() {
    let store = get_test_store().await;
    let first = reserved_order("cust-1", 0);
    let second = reserved_order("cust-2", 1);
    let third = reserved_order("cust-1", 2);
    for order in [&first, &second, &third] {
        store.create(order).await.unwrap();
    }
    store
        .update_status(
            second.id(),
            StatusUpdate::new(OrderStatus::Reserved, OrderStatus::Cancelled),
        )
        .await
        .unwrap();

    let all: Vec<_> = store.list_all().await.unwrap().iter().map(Order::id).collect();
    assert_eq!(all, vec![first.id(), second.id(), third.id()]);

    let active: Vec<_> = store.list_active().await.unwrap().iter().map(Order::id).collect();
    assert_eq!(active, vec![first.id(), third.id()]);

    let reserved = store.list_by_status(OrderStatus::Reserved).await.unwrap();
    assert_eq!(reserved.len(), 2);

    let mine: Vec<_> = store
        .list_by_customer(&CustomerId::new("cust-1"))
        .await
        .unwrap()
        .iter()
        .map(Order::id)
        .collect();
    assert_eq!(mine, vec![third.id(), first.id()]);
}

fn issued_payment(order: &Order, id: &str) -> Payment {
    Payment::issued(
        GatewayPaymentId::new(id),
        order.id(),
        order.vehicle().vehicle_id.clone(),
        order.total(),
        format!("https://qr.example/{id}.png"),
        serde_json::json!({ "id": id }),
    )
}

fn to_processing() -> StatusUpdate {
    StatusUpdate::new(OrderStatus::Reserved, OrderStatus::PaymentProcessing)
}

#[tokio::test]
#[serial]
async fn start_payment_round_trip() {
    let store = get_test_store().await;
    let order = reserved_order("cust-1", 0);
    store.create(&order).await.unwrap();
    store.claim_payment(order.id()).await.unwrap();

    let payment = issued_payment(&order, "ORDE_1234");
    let started = store.start_payment(to_processing(), &payment).await.unwrap();
    assert_eq!(started.status(), OrderStatus::PaymentProcessing);
    assert_eq!(started.status_history().len(), 3);
    assert_eq!(started.payment_id(), Some(&payment.gateway_payment_id));

    let updated = store
        .update_payment_status(order.id(), PaymentStatus::Approved)
        .await
        .unwrap();
    assert_eq!(updated.payment_status(), PaymentStatus::Approved);

    let stored = store.get_payment(order.id()).await.unwrap().unwrap();
    assert_eq!(stored.gateway_payment_id, GatewayPaymentId::new("ORDE_1234"));
    assert_eq!(stored.status, PaymentStatus::Approved);
    assert_eq!(stored.amount, Money::from_units(50000));
    assert_eq!(stored.raw["id"], "ORDE_1234");
}

#[tokio::test]
#[serial]
async fn rejected_start_payment_rolls_back() {
    let store = get_test_store().await;
    let order = reserved_order("cust-1", 0);
    store.create(&order).await.unwrap();
    store
        .update_status(
            order.id(),
            StatusUpdate::new(OrderStatus::Reserved, OrderStatus::Cancelled),
        )
        .await
        .unwrap();

    let result = store
        .start_payment(to_processing(), &issued_payment(&order, "ORDE_1"))
        .await;

    assert!(matches!(
        result,
        Err(StoreError::ConcurrencyConflict {
            actual: OrderStatus::Cancelled,
            ..
        })
    ));
    let stored = store.get_by_id(order.id()).await.unwrap().unwrap();
    assert_eq!(stored.payment_id(), None);
    assert_eq!(stored.status_history().len(), 3);
    assert!(store.get_payment(order.id()).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn concurrent_claims_have_one_winner() {
    let store = get_test_store().await;
    let order = reserved_order("cust-1", 0);
    store.create(&order).await.unwrap();

    let (first, second) = tokio::join!(
        store.claim_payment(order.id()),
        store.claim_payment(order.id())
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(StoreError::PaymentAlreadyClaimed { .. })
    )));
}

#[tokio::test]
#[serial]
async fn released_claim_returns_to_pending() {
    let store = get_test_store().await;
    let order = reserved_order("cust-1", 0);
    store.create(&order).await.unwrap();
    store.claim_payment(order.id()).await.unwrap();

    let released = store.release_payment_claim(order.id()).await.unwrap();
    assert_eq!(released.payment_status(), PaymentStatus::Pending);
    assert_eq!(released.status(), OrderStatus::Reserved);
}

#[tokio::test]
#[serial]
async fn payment_for_unknown_order_is_rejected() {
    let store = get_test_store().await;
    let payment = Payment::issued(
        GatewayPaymentId::new("ORDE_1"),
        OrderId::new(),
        VehicleId::new("veh-1"),
        Money::from_units(1),
        "link",
        serde_json::json!({}),
    );

    let result = store.start_payment(to_processing(), &payment).await;
    assert!(matches!(result, Err(StoreError::OrderNotFound(_))));
}
