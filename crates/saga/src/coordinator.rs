//! Saga coordinator for vehicle sale orders.

use chrono::Utc;
use common::{CustomerId, OrderId, VehicleId};
use domain::{Order, OrderError, OrderStatus, PaymentStatus};
use order_store::{OrderStore, StatusUpdate};

use crate::compensation::{CompensationJournal, CompensationKind};
use crate::error::{Result, SagaError};
use crate::order_fulfillment;
use crate::services::{CustomerDirectory, CustomerView, InventoryService};
use crate::steps::SagaSteps;

/// Orchestrates order creation, finalization, and cancellation.
///
/// Creation runs customer check → vehicle check → reservation → persist,
/// releasing the reservation if anything after it fails. Finalization and
/// cancellation validate the order locally before making any remote call.
pub struct OrderSagaCoordinator<S, C, I>
where
    S: OrderStore,
    C: CustomerDirectory,
    I: InventoryService,
{
    store: S,
    steps: SagaSteps<C, I>,
    journal: CompensationJournal,
}

impl<S, C, I> OrderSagaCoordinator<S, C, I>
where
    S: OrderStore,
    C: CustomerDirectory,
    I: InventoryService,
{
    /// Creates a new saga coordinator with an empty compensation journal.
    pub fn new(store: S, customers: C, inventory: I) -> Self {
        Self::with_journal(store, customers, inventory, CompensationJournal::new())
    }

    /// Creates a coordinator that records failures in an existing journal.
    pub fn with_journal(store: S, customers: C, inventory: I, journal: CompensationJournal) -> Self {
        Self {
            store,
            steps: SagaSteps::new(customers, inventory),
            journal,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn journal(&self) -> &CompensationJournal {
        &self.journal
    }

    /// Loads a customer through the customer step.
    pub async fn lookup_customer(&self, customer_id: &CustomerId) -> Result<CustomerView> {
        self.steps.verify_customer(customer_id).await
    }

    /// Creates an order for a customer and reserves the vehicle.
    ///
    /// Returns the persisted order, in `Reserved` status.
    #[tracing::instrument(skip(self), fields(saga_type = order_fulfillment::SAGA_TYPE))]
    pub async fn create_order(&self, customer_id: CustomerId, vehicle_id: VehicleId) -> Result<Order> {
        observe("create_order", self.run_create_order(customer_id, vehicle_id)).await
    }

    async fn run_create_order(&self, customer_id: CustomerId, vehicle_id: VehicleId) -> Result<Order> {
        if customer_id.is_blank() {
            return Err(SagaError::Validation("customer_id is required".to_string()));
        }
        if vehicle_id.is_blank() {
            return Err(SagaError::Validation("vehicle_id is required".to_string()));
        }

        // Nothing to compensate until the reservation succeeds.
        self.steps.verify_customer(&customer_id).await?;
        let vehicle = self.steps.verify_vehicle(&vehicle_id).await?;
        self.steps.reserve_vehicle(&vehicle_id, &customer_id).await?;

        let order = Order::reserved(customer_id, vehicle.snapshot(), Utc::now());
        tracing::info!(
            step = order_fulfillment::STEP_PERSIST_ORDER,
            order_id = %order.id(),
            "saga step started"
        );

        if let Err(e) = self.store.create(&order).await {
            self.compensate_reservation(order.id(), &vehicle_id).await;
            return Err(e.into());
        }

        tracing::info!(order_id = %order.id(), "order created");
        Ok(order)
    }

    /// Releases a reservation after a later step failed.
    ///
    /// Runs once; a failure is logged, counted, and journaled, never returned.
    async fn compensate_reservation(&self, order_id: OrderId, vehicle_id: &VehicleId) {
        metrics::counter!("saga_compensations_total").increment(1);
        tracing::warn!(%order_id, %vehicle_id, "compensating vehicle reservation");

        if let Err(e) = self.steps.release_vehicle(vehicle_id).await {
            metrics::counter!("saga_compensation_failures_total").increment(1);
            tracing::error!(%order_id, %vehicle_id, error = %e, "compensation failed, vehicle left reserved");
            self.journal.record(
                order_id,
                vehicle_id.clone(),
                CompensationKind::ReleaseReservation,
                e.to_string(),
            );
        }
    }

    /// Completes a paid order by removing the vehicle from stock.
    ///
    /// A removal failure is not compensated: the order stays `PaymentApproved`
    /// and an operator alert is journaled.
    #[tracing::instrument(skip(self))]
    pub async fn finalize_order(&self, order_id: OrderId) -> Result<Order> {
        observe("finalize_order", self.run_finalize_order(order_id)).await
    }

    async fn run_finalize_order(&self, order_id: OrderId) -> Result<Order> {
        let order = self.get_order(order_id).await?;
        if order.is_terminal() {
            return Err(OrderError::TerminalState {
                current_status: order.status(),
                target: OrderStatus::Completed,
            }
            .into());
        }
        if order.payment_status() != PaymentStatus::Approved {
            return Err(SagaError::PaymentNotApproved {
                order_id,
                payment_status: order.payment_status(),
            });
        }
        order.status().check_transition(OrderStatus::Completed)?;

        let vehicle_id = &order.vehicle().vehicle_id;
        if let Err(e) = self.steps.remove_vehicle(vehicle_id).await {
            tracing::error!(%order_id, %vehicle_id, error = %e, "vehicle removal failed, operator action required");
            self.journal.record(
                order_id,
                vehicle_id.clone(),
                CompensationKind::RemoveFromStock,
                e.to_string(),
            );
            return Err(e);
        }

        let completed = self
            .store
            .update_status(
                order_id,
                StatusUpdate::new(order.status(), OrderStatus::Completed),
            )
            .await?;

        tracing::info!(%order_id, "order completed");
        Ok(completed)
    }

    /// Cancels an order, releasing the vehicle if the order still holds it.
    ///
    /// If the release fails the order is left untouched so the cancellation
    /// can be retried. If the release succeeds but the order cannot be
    /// marked cancelled, the mismatch is journaled.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<Order> {
        observe("cancel_order", self.run_cancel_order(order_id)).await
    }

    async fn run_cancel_order(&self, order_id: OrderId) -> Result<Order> {
        let order = self.get_order(order_id).await?;
        order.status().check_transition(OrderStatus::Cancelled)?;

        let vehicle_id = &order.vehicle().vehicle_id;
        let released = order.status().holds_reservation();
        if released {
            self.steps.release_vehicle(vehicle_id).await?;
        }

        let update = StatusUpdate::new(order.status(), OrderStatus::Cancelled);
        let mut cancelled = match self.store.update_status(order_id, update).await {
            Ok(cancelled) => cancelled,
            Err(e) if released => {
                tracing::error!(%order_id, %vehicle_id, error = %e, "vehicle released but order not cancelled, operator action required");
                self.journal.record(
                    order_id,
                    vehicle_id.clone(),
                    CompensationKind::CancelAfterRelease,
                    e.to_string(),
                );
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        if cancelled.payment_status().is_open() {
            cancelled = self
                .store
                .update_payment_status(order_id, PaymentStatus::Cancelled)
                .await?;
        }

        tracing::info!(%order_id, "order cancelled");
        Ok(cancelled)
    }

    /// Moves an order to `Cancelled` or `Completed` on request.
    ///
    /// Other statuses are only reachable through the payment flow.
    pub async fn update_order_status(&self, order_id: OrderId, target: OrderStatus) -> Result<Order> {
        match target {
            OrderStatus::Cancelled => self.cancel_order(order_id).await,
            OrderStatus::Completed => self.finalize_order(order_id).await,
            other => Err(SagaError::Validation(format!(
                "status {other} cannot be set directly; use Cancelled or Completed"
            ))),
        }
    }

    /// Loads an order, failing with `OrderNotFound` if it doesn't exist.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .get_by_id(order_id)
            .await?
            .ok_or(SagaError::OrderNotFound(order_id))
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        Ok(self.store.list_all().await?)
    }

    /// Orders that are neither completed nor cancelled, oldest first.
    pub async fn list_active_orders(&self) -> Result<Vec<Order>> {
        Ok(self.store.list_active().await?)
    }

    pub async fn list_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        Ok(self.store.list_by_status(status).await?)
    }

    /// A customer's orders, newest first.
    pub async fn list_by_customer(&self, customer_id: &CustomerId) -> Result<Vec<Order>> {
        Ok(self.store.list_by_customer(customer_id).await?)
    }
}

/// Runs one saga operation, counting and timing it under `operation`.
async fn observe<T, F>(operation: &'static str, run: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    metrics::counter!("saga_executions_total", "operation" => operation).increment(1);
    let saga_start = std::time::Instant::now();

    let result = run.await;

    metrics::histogram!("saga_duration_seconds", "operation" => operation)
        .record(saga_start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        metrics::counter!("saga_failed", "operation" => operation).increment(1);
        tracing::warn!(operation, error = %e, "saga operation failed");
    }
    result
}
