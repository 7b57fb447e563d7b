//! Collaborator traits and their in-memory and HTTP implementations.

pub mod customer;
pub mod gateway;
pub mod http;
pub mod inventory;

use thiserror::Error;

pub use customer::{CustomerDirectory, CustomerView, InMemoryCustomerDirectory};
pub use gateway::{
    GatewayError, GatewayPayment, GatewayPaymentStatus, InMemoryPaymentGateway, PaymentGateway,
    PaymentRequest, map_external_status,
};
pub use http::{HttpCustomerDirectory, HttpInventoryService, PagSeguroGateway, build_http_client};
pub use inventory::{
    InMemoryInventoryService, InventoryCall, InventoryService, VehicleAvailability, VehicleView,
};

/// Failure reported by the customer or inventory collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The requested record does not exist.
    #[error("record not found")]
    NotFound,

    /// The record exists but is not in a state that allows the operation.
    #[error("precondition failed: {0}")]
    Unavailable(String),

    /// The call itself failed (transport error, unexpected status, bad body).
    #[error("remote call failed: {0}")]
    Remote(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::Remote(err.to_string())
    }
}
