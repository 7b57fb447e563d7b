//! Order fulfillment saga constants.

/// The saga type identifier for order fulfillment.
pub const SAGA_TYPE: &str = "VehicleSale";

/// Step name: Check that the customer exists.
pub const STEP_VERIFY_CUSTOMER: &str = "verify_customer";

/// Step name: Check that the vehicle exists and is for sale.
pub const STEP_VERIFY_VEHICLE: &str = "verify_vehicle";

/// Step name: Reserve the vehicle for the customer.
pub const STEP_RESERVE_VEHICLE: &str = "reserve_vehicle";

/// Step name: Persist the new order.
pub const STEP_PERSIST_ORDER: &str = "persist_order";

/// Step name: Release the vehicle reservation.
pub const STEP_RELEASE_VEHICLE: &str = "release_vehicle";

/// Step name: Remove the sold vehicle from stock.
pub const STEP_REMOVE_VEHICLE: &str = "remove_vehicle";
