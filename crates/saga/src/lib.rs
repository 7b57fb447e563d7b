//! Vehicle sale saga and payment orchestration.
//!
//! A sale runs as a short saga over remote collaborators:
//! 1. Verify the customer
//! 2. Verify the vehicle is available
//! 3. Reserve the vehicle
//! 4. Persist the order
//!
//! If persisting fails, the reservation is released. Payment outcomes later
//! either finalize the order (removing the vehicle from stock) or cancel it
//! (releasing the reservation).

pub mod compensation;
pub mod coordinator;
pub mod error;
pub mod order_fulfillment;
pub mod payment;
pub mod services;
pub mod steps;

pub use compensation::{CompensationJournal, CompensationKind, CompensationRecord};
pub use coordinator::OrderSagaCoordinator;
pub use error::{ErrorKind, SagaError};
pub use payment::{
    PaymentOrchestrator, PaymentSettings, WebhookData, WebhookNotification, WebhookOutcome,
};
pub use services::{
    CustomerDirectory, CustomerView, GatewayError, GatewayPayment, GatewayPaymentStatus,
    HttpCustomerDirectory, HttpInventoryService, InMemoryCustomerDirectory,
    InMemoryInventoryService, InMemoryPaymentGateway, InventoryCall, InventoryService,
    PagSeguroGateway, PaymentGateway, PaymentRequest, ServiceError, VehicleAvailability,
    VehicleView, build_http_client, map_external_status,
};
pub use steps::SagaSteps;
