//! Identifier types shared across the vehicle sales crates.

mod types;

pub use types::{CustomerId, GatewayPaymentId, OrderId, VehicleId};
