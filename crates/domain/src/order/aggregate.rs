//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{CustomerId, GatewayPaymentId, OrderId};
use serde::{Deserialize, Serialize};

use super::{Money, OrderError, OrderStatus, PaymentStatus, StatusEntry, VehicleSnapshot};

/// Order aggregate root.
///
/// Represents the sale of one vehicle to one customer, from reservation to
/// completion or cancellation. Status changes go through [`Order::transition`],
/// which keeps the status history in step with the current status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    customer_id: CustomerId,
    vehicle: VehicleSnapshot,
    total: Money,
    status: OrderStatus,
    payment_status: PaymentStatus,
    payment_id: Option<GatewayPaymentId>,
    status_history: Vec<StatusEntry>,
    created_at: DateTime<Utc>,
}

/// Flat representation of an order, used by stores to rebuild the aggregate.
#[derive(Debug, Clone)]
pub struct OrderRecord {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub vehicle: VehicleSnapshot,
    pub total: Money,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_id: Option<GatewayPaymentId>,
    pub status_history: Vec<StatusEntry>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<OrderRecord> for Order {
    type Error = OrderError;

    fn try_from(record: OrderRecord) -> Result<Self, Self::Error> {
        match record.status_history.last() {
            Some(last) if last.status == record.status => {}
            _ => {
                return Err(OrderError::InconsistentHistory {
                    order_id: record.id,
                    status: record.status,
                });
            }
        }

        Ok(Self {
            id: record.id,
            customer_id: record.customer_id,
            vehicle: record.vehicle,
            total: record.total,
            status: record.status,
            payment_status: record.payment_status,
            payment_id: record.payment_id,
            status_history: record.status_history,
            created_at: record.created_at,
        })
    }
}

impl Order {
    /// Creates the order for a vehicle whose reservation just succeeded.
    ///
    /// The order passes through `Processing` into `Reserved` at the same
    /// instant, and both entries are recorded in the history.
    pub fn reserved(customer_id: CustomerId, vehicle: VehicleSnapshot, at: DateTime<Utc>) -> Self {
        let total = vehicle.price;
        Self {
            id: OrderId::new(),
            customer_id,
            vehicle,
            total,
            status: OrderStatus::Reserved,
            payment_status: PaymentStatus::Pending,
            payment_id: None,
            status_history: vec![
                StatusEntry::new(OrderStatus::Processing, at),
                StatusEntry::new(OrderStatus::Reserved, at),
            ],
            created_at: at,
        }
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn customer_id(&self) -> &CustomerId {
        &self.customer_id
    }

    /// Returns the vehicle snapshot taken at reservation time.
    pub fn vehicle(&self) -> &VehicleSnapshot {
        &self.vehicle
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn payment_id(&self) -> Option<&GatewayPaymentId> {
        self.payment_id.as_ref()
    }

    /// Returns the status history, oldest first.
    pub fn status_history(&self) -> &[StatusEntry] {
        &self.status_history
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns true if the order is in a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Converts the aggregate into its flat record form.
    pub fn to_record(&self) -> OrderRecord {
        OrderRecord {
            id: self.id,
            customer_id: self.customer_id.clone(),
            vehicle: self.vehicle.clone(),
            total: self.total,
            status: self.status,
            payment_status: self.payment_status,
            payment_id: self.payment_id.clone(),
            status_history: self.status_history.clone(),
            created_at: self.created_at,
        }
    }
}

// Mutations
impl Order {
    /// Moves the order to `target` and appends exactly one history entry.
    pub fn transition(&mut self, target: OrderStatus, at: DateTime<Utc>) -> Result<(), OrderError> {
        self.status.check_transition(target)?;
        self.status = target;
        self.status_history.push(StatusEntry::new(target, at));
        Ok(())
    }

    pub fn set_payment_status(&mut self, payment_status: PaymentStatus) {
        self.payment_status = payment_status;
    }

    pub fn set_payment_id(&mut self, payment_id: GatewayPaymentId) {
        self.payment_id = Some(payment_id);
    }
}
