//! Domain layer for the vehicle sales order service.
//!
//! This crate provides:
//! - the Order aggregate with its status history
//! - the order status and payment status state machines
//! - value objects (money, vehicle snapshot)
//! - the Payment record issued by the gateway

pub mod order;
pub mod payment;

pub use order::{
    Money, Order, OrderError, OrderRecord, OrderStatus, PaymentOutcome, PaymentStatus,
    StatusEntry, VehicleSnapshot,
};
pub use payment::Payment;
