//! Payment orchestration: creating PIX payments and applying their outcomes.

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::OrderId;
use domain::{Order, OrderError, OrderStatus, Payment, PaymentOutcome, PaymentStatus};
use order_store::{OrderStore, StatusUpdate, StoreError};
use serde::Deserialize;

use crate::compensation::CompensationKind;
use crate::coordinator::OrderSagaCoordinator;
use crate::error::{Result, SagaError};
use crate::services::{
    CustomerDirectory, InventoryService, PaymentGateway, PaymentRequest, map_external_status,
};

/// Webhook event type that carries a payment status change.
const TRANSACTION_EVENT: &str = "transaction";

/// Settings for building payment requests.
#[derive(Debug, Clone)]
pub struct PaymentSettings {
    /// URLs the gateway posts status notifications to.
    pub notification_urls: Vec<String>,
    /// How long the PIX QR code stays valid.
    pub qr_code_ttl: Duration,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            notification_urls: Vec::new(),
            qr_code_ttl: Duration::hours(1),
        }
    }
}

/// A payment notification posted by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookNotification {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub data: Option<WebhookData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub reference_id: String,
    pub status: String,
}

/// What a webhook delivery led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Not a payment event.
    Ignored,
    /// The payment has no outcome yet; nothing changed.
    Pending,
    /// The outcome was applied to the order.
    Applied(PaymentOutcome),
}

/// Creates payments for reserved orders and applies payment outcomes.
///
/// Webhooks, manual confirmations, and status refreshes all end up in
/// [`PaymentOrchestrator::confirm_payment`].
pub struct PaymentOrchestrator<S, C, I, G>
where
    S: OrderStore,
    C: CustomerDirectory,
    I: InventoryService,
    G: PaymentGateway,
{
    coordinator: Arc<OrderSagaCoordinator<S, C, I>>,
    gateway: G,
    settings: PaymentSettings,
}

impl<S, C, I, G> PaymentOrchestrator<S, C, I, G>
where
    S: OrderStore,
    C: CustomerDirectory,
    I: InventoryService,
    G: PaymentGateway,
{
    pub fn new(
        coordinator: Arc<OrderSagaCoordinator<S, C, I>>,
        gateway: G,
        settings: PaymentSettings,
    ) -> Self {
        Self {
            coordinator,
            gateway,
            settings,
        }
    }

    pub fn coordinator(&self) -> &Arc<OrderSagaCoordinator<S, C, I>> {
        &self.coordinator
    }

    /// Requests a PIX payment for a reserved order.
    ///
    /// The order is claimed before the gateway is called, so concurrent
    /// requests for one order reach the gateway once. On success the order
    /// moves to `PaymentProcessing` with payment status `Processing`, and the
    /// payment record is stored together with it.
    #[tracing::instrument(skip(self))]
    pub async fn create_payment(&self, order_id: OrderId) -> Result<Payment> {
        let order = self.coordinator.get_order(order_id).await?;
        if order.status() != OrderStatus::Reserved {
            return Err(SagaError::InvalidOrderStatus {
                order_id,
                expected: OrderStatus::Reserved,
                actual: order.status(),
            });
        }

        let customer = self.coordinator.lookup_customer(order.customer_id()).await?;
        let request = PaymentRequest::for_order(
            &order,
            &customer,
            &self.settings.notification_urls,
            Utc::now(),
            self.settings.qr_code_ttl,
        );

        let store = self.coordinator.store();
        store.claim_payment(order_id).await.map_err(|e| match e {
            StoreError::ConcurrencyConflict { actual, .. } => SagaError::InvalidOrderStatus {
                order_id,
                expected: OrderStatus::Reserved,
                actual,
            },
            StoreError::PaymentAlreadyClaimed { .. } => SagaError::PaymentInProgress(order_id),
            other => other.into(),
        })?;

        let issued = match self.gateway.create_payment(&request).await {
            Ok(issued) => issued,
            Err(e) => {
                tracing::warn!(%order_id, error = %e, "payment gateway refused the payment");
                self.release_claim(order_id).await;
                return Err(e.into());
            }
        };

        let payment = Payment::issued(
            issued.id,
            order_id,
            order.vehicle().vehicle_id.clone(),
            order.total(),
            issued.qr_code_link,
            issued.raw,
        );
        let update = StatusUpdate::new(OrderStatus::Reserved, OrderStatus::PaymentProcessing);
        if let Err(e) = store.start_payment(update, &payment).await {
            let payment_id = &payment.gateway_payment_id;
            tracing::error!(%order_id, %payment_id, error = %e, "gateway payment issued but not stored, operator action required");
            self.coordinator.journal().record(
                order_id,
                payment.vehicle_id.clone(),
                CompensationKind::AttachPayment,
                format!("payment {payment_id}: {e}"),
            );
            self.release_claim(order_id).await;
            return Err(e.into());
        }

        tracing::info!(%order_id, payment_id = %payment.gateway_payment_id, "payment created");
        Ok(payment)
    }

    /// Lets a later request try again; a failure only leaves the claim in place.
    async fn release_claim(&self, order_id: OrderId) {
        if let Err(e) = self.coordinator.store().release_payment_claim(order_id).await {
            tracing::error!(%order_id, error = %e, "could not release payment claim");
        }
    }

    /// Applies a payment outcome to an order.
    ///
    /// Approved payments move the order to `PaymentApproved` and finalize it;
    /// declined or cancelled payments cancel it. Orders that never had a
    /// payment created are rejected.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_payment(&self, order_id: OrderId, outcome: PaymentOutcome) -> Result<Order> {
        metrics::counter!("payment_confirmations_total", "outcome" => outcome.as_str())
            .increment(1);

        let order = self.coordinator.get_order(order_id).await?;
        let target = match outcome {
            PaymentOutcome::Approved => OrderStatus::PaymentApproved,
            PaymentOutcome::Declined | PaymentOutcome::Cancelled => OrderStatus::Cancelled,
        };
        if order.is_terminal() {
            return Err(OrderError::TerminalState {
                current_status: order.status(),
                target,
            }
            .into());
        }
        if order.payment_id().is_none() {
            // Claimed but not yet attached: the outcome is picked up by a later refresh.
            if order.payment_status() == PaymentStatus::Processing {
                return Err(SagaError::PaymentInProgress(order_id));
            }
            return Err(SagaError::PaymentNotInitiated(order_id));
        }
        // A retried approval finds the order already approved.
        if order.status() != target {
            order.status().check_transition(target)?;
        }

        let store = self.coordinator.store();
        store
            .update_payment_status(order_id, outcome.payment_status())
            .await?;

        match outcome {
            PaymentOutcome::Approved => {
                if order.status() != OrderStatus::PaymentApproved {
                    store
                        .update_status(
                            order_id,
                            StatusUpdate::new(order.status(), OrderStatus::PaymentApproved),
                        )
                        .await?;
                }
                self.coordinator.finalize_order(order_id).await?;
            }
            PaymentOutcome::Declined | PaymentOutcome::Cancelled => {
                self.coordinator.cancel_order(order_id).await?;
            }
        }

        self.coordinator.get_order(order_id).await
    }

    /// Returns the order, optionally reconciling it with the gateway first.
    ///
    /// Reconciliation failures are logged and never returned.
    #[tracing::instrument(skip(self))]
    pub async fn query_status(&self, order_id: OrderId, refresh: bool) -> Result<Order> {
        let order = self.coordinator.get_order(order_id).await?;
        if !refresh {
            return Ok(order);
        }
        let Some(payment_id) = order.payment_id() else {
            return Ok(order);
        };

        match self.gateway.query_payment(payment_id).await {
            Ok(remote) => {
                let mapped = remote.payment_status();
                if mapped != order.payment_status()
                    && let Ok(outcome) = PaymentOutcome::try_from(mapped)
                {
                    tracing::info!(%order_id, %outcome, "gateway reports a new payment outcome");
                    if let Err(e) = self.confirm_payment(order_id, outcome).await {
                        tracing::warn!(%order_id, error = %e, "payment reconciliation failed");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(%order_id, error = %e, "payment status query failed");
            }
        }

        self.coordinator.get_order(order_id).await
    }

    /// Returns the payment record of an order, if a payment was created.
    pub async fn get_payment(&self, order_id: OrderId) -> Result<Option<Payment>> {
        Ok(self.coordinator.store().get_payment(order_id).await?)
    }

    /// Applies a gateway notification.
    #[tracing::instrument(skip_all, fields(event = %notification.event))]
    pub async fn handle_webhook(&self, notification: &WebhookNotification) -> Result<WebhookOutcome> {
        if notification.event != TRANSACTION_EVENT {
            return Ok(WebhookOutcome::Ignored);
        }
        let data = notification
            .data
            .as_ref()
            .ok_or_else(|| SagaError::Validation("notification has no data".to_string()))?;
        let order_id = OrderId::parse(&data.reference_id).map_err(|_| {
            SagaError::Validation(format!("invalid reference_id: {}", data.reference_id))
        })?;

        match PaymentOutcome::try_from(map_external_status(&data.status)) {
            Ok(outcome) => {
                self.confirm_payment(order_id, outcome).await?;
                Ok(WebhookOutcome::Applied(outcome))
            }
            Err(_) => {
                tracing::debug!(%order_id, status = %data.status, "payment still pending");
                Ok(WebhookOutcome::Pending)
            }
        }
    }
}
