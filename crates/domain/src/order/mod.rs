//! Order aggregate and related types.

mod aggregate;
mod state;
mod value_objects;

pub use aggregate::{Order, OrderRecord};
pub use state::{OrderStatus, PaymentOutcome, PaymentStatus};
pub use value_objects::{Money, StatusEntry, VehicleSnapshot};

use common::OrderId;
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The order is completed or cancelled and accepts no further transitions.
    #[error("Order is in terminal state {current_status}: cannot move to {target}")]
    TerminalState {
        current_status: OrderStatus,
        target: OrderStatus,
    },

    /// The state machine defines no edge between the two statuses.
    #[error("Invalid status transition: {current_status} -> {target}")]
    InvalidTransition {
        current_status: OrderStatus,
        target: OrderStatus,
    },

    /// A status name could not be parsed.
    #[error("Unknown status: {0}")]
    UnknownStatus(String),

    /// A stored order whose history does not end at its current status.
    #[error("Order {order_id} history does not end at its status {status}")]
    InconsistentHistory {
        order_id: OrderId,
        status: OrderStatus,
    },
}
