//! Route handlers.

pub mod admin;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod payments;
pub mod webhooks;

use common::OrderId;

use crate::error::ApiError;

pub(crate) fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    OrderId::parse(id).map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}
