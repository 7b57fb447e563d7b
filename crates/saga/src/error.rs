//! Saga error types.

use common::{CustomerId, OrderId, VehicleId};
use domain::{OrderError, OrderStatus, PaymentStatus};
use order_store::StoreError;
use thiserror::Error;

use crate::services::{GatewayError, ServiceError};

/// Coarse classification used by callers to decide how to report an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A customer, vehicle, or order does not exist.
    NotFound,
    /// The order or vehicle is in the wrong state for the request.
    InvalidState,
    /// A collaborator call failed.
    RemoteFailure,
    /// The request itself is malformed.
    Validation,
    Internal,
}

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    #[error("Customer not found: {0}")]
    CustomerNotFound(CustomerId),

    #[error("Vehicle not found: {0}")]
    VehicleNotFound(VehicleId),

    /// The vehicle exists but is reserved or otherwise not for sale.
    #[error("Vehicle {0} is not available for sale")]
    VehicleUnavailable(VehicleId),

    /// A customer or vehicle lookup failed for a reason other than absence.
    #[error("Lookup failed: {0}")]
    LookupFailed(ServiceError),

    #[error("Could not reserve vehicle {vehicle_id}: {source}")]
    ReservationFailed {
        vehicle_id: VehicleId,
        source: ServiceError,
    },

    #[error("Could not release vehicle {vehicle_id}: {source}")]
    ReleaseFailed {
        vehicle_id: VehicleId,
        source: ServiceError,
    },

    #[error("Could not remove vehicle {vehicle_id} from stock: {source}")]
    RemovalFailed {
        vehicle_id: VehicleId,
        source: ServiceError,
    },

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Payment for order {order_id} is not approved (status {payment_status})")]
    PaymentNotApproved {
        order_id: OrderId,
        payment_status: PaymentStatus,
    },

    /// The order is not in the status the operation requires.
    #[error("Order {order_id} is {actual}, expected {expected}")]
    InvalidOrderStatus {
        order_id: OrderId,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    /// A payment outcome arrived for an order that never had a payment created.
    #[error("No payment was created for order {0}")]
    PaymentNotInitiated(OrderId),

    /// Another payment request for the order is already under way.
    #[error("A payment for order {0} is already being created")]
    PaymentInProgress(OrderId),

    #[error(transparent)]
    Domain(#[from] OrderError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Order store error: {0}")]
    Store(#[from] StoreError),
}

impl SagaError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SagaError::CustomerNotFound(_)
            | SagaError::VehicleNotFound(_)
            | SagaError::OrderNotFound(_)
            | SagaError::Store(StoreError::OrderNotFound(_)) => ErrorKind::NotFound,

            SagaError::VehicleUnavailable(_)
            | SagaError::PaymentNotApproved { .. }
            | SagaError::InvalidOrderStatus { .. }
            | SagaError::PaymentNotInitiated(_)
            | SagaError::PaymentInProgress(_)
            | SagaError::Store(StoreError::ConcurrencyConflict { .. })
            | SagaError::Store(StoreError::PaymentAlreadyClaimed { .. }) => ErrorKind::InvalidState,

            SagaError::Domain(err) | SagaError::Store(StoreError::Domain(err)) => match err {
                OrderError::TerminalState { .. } | OrderError::InvalidTransition { .. } => {
                    ErrorKind::InvalidState
                }
                OrderError::UnknownStatus(_) => ErrorKind::Validation,
                OrderError::InconsistentHistory { .. } => ErrorKind::Internal,
            },

            SagaError::LookupFailed(_)
            | SagaError::ReservationFailed { .. }
            | SagaError::ReleaseFailed { .. }
            | SagaError::RemovalFailed { .. }
            | SagaError::Gateway(_) => ErrorKind::RemoteFailure,

            SagaError::Validation(_) => ErrorKind::Validation,

            SagaError::Store(_) => ErrorKind::Internal,
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let order_id = OrderId::new();

        assert_eq!(
            SagaError::CustomerNotFound(CustomerId::new("x")).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            SagaError::Store(StoreError::OrderNotFound(order_id)).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            SagaError::VehicleUnavailable(VehicleId::new("veh-1")).kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            SagaError::Domain(OrderError::TerminalState {
                current_status: OrderStatus::Completed,
                target: OrderStatus::Cancelled,
            })
            .kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            SagaError::ReleaseFailed {
                vehicle_id: VehicleId::new("veh-1"),
                source: ServiceError::Remote("boom".to_string()),
            }
            .kind(),
            ErrorKind::RemoteFailure
        );
        assert_eq!(
            SagaError::Gateway(GatewayError::new(Some(400), "bad")).kind(),
            ErrorKind::RemoteFailure
        );
        assert_eq!(
            SagaError::PaymentInProgress(order_id).kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            SagaError::Validation("empty id".to_string()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            SagaError::Store(StoreError::Unavailable("down".to_string())).kind(),
            ErrorKind::Internal
        );
    }
}
