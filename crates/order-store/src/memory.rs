use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::{CustomerId, GatewayPaymentId, OrderId};
use domain::{Order, OrderStatus, Payment, PaymentStatus};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    store::{OrderStore, StatusUpdate},
};

/// In-memory order store implementation for testing.
///
/// This implementation keeps all orders in memory and provides
/// the same interface as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
    payments: Arc<RwLock<HashMap<OrderId, Payment>>>,
    fail_on_create: Arc<AtomicBool>,
    fail_on_start_payment: Arc<AtomicBool>,
    fail_on_update_status: Arc<AtomicBool>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to reject `create` calls.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.fail_on_create.store(fail, Ordering::SeqCst);
    }

    /// Configures the store to reject `start_payment` calls.
    pub fn set_fail_on_start_payment(&self, fail: bool) {
        self.fail_on_start_payment.store(fail, Ordering::SeqCst);
    }

    /// Configures the store to reject `update_status` calls.
    pub fn set_fail_on_update_status(&self, fail: bool) {
        self.fail_on_update_status.store(fail, Ordering::SeqCst);
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Clears all orders and payments.
    pub async fn clear(&self) {
        self.orders.write().await.clear();
        self.payments.write().await.clear();
    }

    async fn select<F>(&self, filter: F) -> Vec<Order>
    where
        F: Fn(&Order) -> bool,
    {
        let orders = self.orders.read().await;
        let mut selected: Vec<_> = orders.values().filter(|o| filter(o)).cloned().collect();
        selected.sort_by_key(|o| (o.created_at(), o.id()));
        selected
    }

    async fn modify<F>(&self, order_id: OrderId, change: F) -> Result<Order>
    where
        F: FnOnce(&mut Order) -> Result<()>,
    {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;

        // Apply to a copy so a failed change leaves the stored order untouched.
        let mut updated = order.clone();
        change(&mut updated)?;
        *order = updated.clone();
        Ok(updated)
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, order: &Order) -> Result<()> {
        if self.fail_on_create.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "order store rejected the write".to_string(),
            ));
        }

        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id()) {
            return Err(StoreError::DuplicateOrder(order.id()));
        }
        orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn get_by_id(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&order_id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Order>> {
        Ok(self.select(|_| true).await)
    }

    async fn list_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        Ok(self.select(|o| o.status() == status).await)
    }

    async fn list_by_customer(&self, customer_id: &CustomerId) -> Result<Vec<Order>> {
        let mut orders = self.select(|o| o.customer_id() == customer_id).await;
        orders.reverse();
        Ok(orders)
    }

    async fn list_active(&self) -> Result<Vec<Order>> {
        Ok(self.select(|o| !o.is_terminal()).await)
    }

    async fn update_status(&self, order_id: OrderId, update: StatusUpdate) -> Result<Order> {
        if self.fail_on_update_status.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "order store rejected the write".to_string(),
            ));
        }

        self.modify(order_id, |order| {
            if order.status() != update.expected {
                return Err(StoreError::ConcurrencyConflict {
                    order_id,
                    expected: update.expected,
                    actual: order.status(),
                });
            }
            order.transition(update.target, update.at)?;
            Ok(())
        })
        .await
    }

    async fn update_payment_status(
        &self,
        order_id: OrderId,
        payment_status: PaymentStatus,
    ) -> Result<Order> {
        let order = self
            .modify(order_id, |order| {
                order.set_payment_status(payment_status);
                Ok(())
            })
            .await?;

        if let Some(payment) = self.payments.write().await.get_mut(&order_id) {
            payment.status = payment_status;
            payment.updated_at = Utc::now();
        }
        Ok(order)
    }

    async fn update_payment_id(
        &self,
        order_id: OrderId,
        payment_id: &GatewayPaymentId,
    ) -> Result<Order> {
        self.modify(order_id, |order| {
            order.set_payment_id(payment_id.clone());
            Ok(())
        })
        .await
    }

    async fn claim_payment(&self, order_id: OrderId) -> Result<Order> {
        self.modify(order_id, |order| {
            if order.status() != OrderStatus::Reserved {
                return Err(StoreError::ConcurrencyConflict {
                    order_id,
                    expected: OrderStatus::Reserved,
                    actual: order.status(),
                });
            }
            if order.payment_status() != PaymentStatus::Pending {
                return Err(StoreError::PaymentAlreadyClaimed {
                    order_id,
                    payment_status: order.payment_status(),
                });
            }
            order.set_payment_status(PaymentStatus::Processing);
            Ok(())
        })
        .await
    }

    async fn release_payment_claim(&self, order_id: OrderId) -> Result<Order> {
        self.modify(order_id, |order| {
            if order.status() == OrderStatus::Reserved
                && order.payment_status() == PaymentStatus::Processing
                && order.payment_id().is_none()
            {
                order.set_payment_status(PaymentStatus::Pending);
            }
            Ok(())
        })
        .await
    }

    async fn start_payment(&self, update: StatusUpdate, payment: &Payment) -> Result<Order> {
        if self.fail_on_start_payment.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "order store rejected the write".to_string(),
            ));
        }

        // Held across the order change so readers never see one without the other.
        let mut payments = self.payments.write().await;
        let order_id = payment.order_id;
        let order = self
            .modify(order_id, |order| {
                if order.status() != update.expected {
                    return Err(StoreError::ConcurrencyConflict {
                        order_id,
                        expected: update.expected,
                        actual: order.status(),
                    });
                }
                order.transition(update.target, update.at)?;
                order.set_payment_status(payment.status);
                order.set_payment_id(payment.gateway_payment_id.clone());
                Ok(())
            })
            .await?;
        payments.insert(order_id, payment.clone());
        Ok(order)
    }

    async fn get_payment(&self, order_id: OrderId) -> Result<Option<Payment>> {
        Ok(self.payments.read().await.get(&order_id).cloned())
    }
}
