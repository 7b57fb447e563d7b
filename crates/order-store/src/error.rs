use common::OrderId;
use domain::{OrderError, OrderStatus, PaymentStatus};
use thiserror::Error;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The order was not found in the store.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// An order with the same id was already stored.
    #[error("Order already exists: {0}")]
    DuplicateOrder(OrderId),

    /// The order was not in the status the caller based its update on.
    #[error(
        "Concurrency conflict for order {order_id}: expected status {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        order_id: OrderId,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    /// Another payment request for the order is under way or done.
    #[error("Payment for order {order_id} already claimed (payment status {payment_status})")]
    PaymentAlreadyClaimed {
        order_id: OrderId,
        payment_status: PaymentStatus,
    },

    /// The requested change violates the order state machine, or a stored
    /// row could not be turned back into an order.
    #[error("Order rule violated: {0}")]
    Domain(#[from] OrderError),

    /// The store refused the operation (used by the in-memory store's fault injection).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
