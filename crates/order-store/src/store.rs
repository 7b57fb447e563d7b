use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CustomerId, GatewayPaymentId, OrderId};
use domain::{Order, OrderStatus, Payment, PaymentStatus};

use crate::Result;

/// A conditional status change.
///
/// The store applies it only if the order is still in `expected`; the status
/// update and the history append happen together or not at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdate {
    pub expected: OrderStatus,
    pub target: OrderStatus,
    pub at: DateTime<Utc>,
}

impl StatusUpdate {
    /// Creates an update timestamped now.
    pub fn new(expected: OrderStatus, target: OrderStatus) -> Self {
        Self {
            expected,
            target,
            at: Utc::now(),
        }
    }
}

/// Core trait for order store implementations.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Stores a new order with its full status history.
    ///
    /// Fails with `DuplicateOrder` if the id is already taken.
    async fn create(&self, order: &Order) -> Result<()>;

    /// Loads an order by id. Returns None if it doesn't exist.
    async fn get_by_id(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Lists every order, oldest first.
    async fn list_all(&self) -> Result<Vec<Order>>;

    /// Lists orders in the given status, oldest first.
    async fn list_by_status(&self, status: OrderStatus) -> Result<Vec<Order>>;

    /// Lists a customer's orders, newest first.
    async fn list_by_customer(&self, customer_id: &CustomerId) -> Result<Vec<Order>>;

    /// Lists orders that are neither completed nor cancelled, oldest first.
    async fn list_active(&self) -> Result<Vec<Order>>;

    /// Changes the order status and appends the matching history entry.
    ///
    /// Fails with `ConcurrencyConflict` if the order is no longer in
    /// `update.expected`, and with `Domain` if the state machine forbids the
    /// transition. Returns the updated order.
    async fn update_status(&self, order_id: OrderId, update: StatusUpdate) -> Result<Order>;

    /// Sets the payment status of the order and of its payment record, if any.
    async fn update_payment_status(
        &self,
        order_id: OrderId,
        payment_status: PaymentStatus,
    ) -> Result<Order>;

    /// Attaches the gateway payment reference to the order.
    async fn update_payment_id(
        &self,
        order_id: OrderId,
        payment_id: &GatewayPaymentId,
    ) -> Result<Order>;

    /// Reserves the right to request a payment for the order.
    ///
    /// Succeeds only while the order is `Reserved` with payment status
    /// `Pending`, and sets the payment status to `Processing`. Fails with
    /// `ConcurrencyConflict` if the order left `Reserved`, and with
    /// `PaymentAlreadyClaimed` if another request got there first.
    async fn claim_payment(&self, order_id: OrderId) -> Result<Order>;

    /// Hands back a claim whose gateway request never produced a payment.
    ///
    /// Puts the payment status back to `Pending` if the order is still
    /// `Reserved`, `Processing` and without a payment id; otherwise leaves
    /// the order as it is.
    async fn release_payment_claim(&self, order_id: OrderId) -> Result<Order>;

    /// Attaches an issued payment to its order in one step.
    ///
    /// Applies `update` with its history entry, sets the order's payment
    /// status and payment id from `payment`, and stores the payment record.
    /// Either all of it is stored or none of it.
    async fn start_payment(&self, update: StatusUpdate, payment: &Payment) -> Result<Order>;

    /// Loads the payment issued for an order.
    async fn get_payment(&self, order_id: OrderId) -> Result<Option<Payment>>;
}

#[async_trait]
impl<T: OrderStore + ?Sized> OrderStore for Arc<T> {
    async fn create(&self, order: &Order) -> Result<()> {
        (**self).create(order).await
    }

    async fn get_by_id(&self, order_id: OrderId) -> Result<Option<Order>> {
        (**self).get_by_id(order_id).await
    }

    async fn list_all(&self) -> Result<Vec<Order>> {
        (**self).list_all().await
    }

    async fn list_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        (**self).list_by_status(status).await
    }

    async fn list_by_customer(&self, customer_id: &CustomerId) -> Result<Vec<Order>> {
        (**self).list_by_customer(customer_id).await
    }

    async fn list_active(&self) -> Result<Vec<Order>> {
        (**self).list_active().await
    }

    async fn update_status(&self, order_id: OrderId, update: StatusUpdate) -> Result<Order> {
        (**self).update_status(order_id, update).await
    }

    async fn update_payment_status(
        &self,
        order_id: OrderId,
        payment_status: PaymentStatus,
    ) -> Result<Order> {
        (**self).update_payment_status(order_id, payment_status).await
    }

    async fn update_payment_id(
        &self,
        order_id: OrderId,
        payment_id: &GatewayPaymentId,
    ) -> Result<Order> {
        (**self).update_payment_id(order_id, payment_id).await
    }

    async fn claim_payment(&self, order_id: OrderId) -> Result<Order> {
        (**self).claim_payment(order_id).await
    }

    async fn release_payment_claim(&self, order_id: OrderId) -> Result<Order> {
        (**self).release_payment_claim(order_id).await
    }

    async fn start_payment(&self, update: StatusUpdate, payment: &Payment) -> Result<Order> {
        (**self).start_payment(update, payment).await
    }

    async fn get_payment(&self, order_id: OrderId) -> Result<Option<Payment>> {
        (**self).get_payment(order_id).await
    }
}
